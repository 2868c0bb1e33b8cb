//! The structured diff model: lines, hunks, files and whole diffs.

pub mod file;
pub mod full;
pub mod header;
pub mod hunk;
pub mod line;

pub use file::{ChangeType, FileDiff, FileMeta, is_generated_path, is_lockfile_path};
pub use full::Diff;
pub use header::{HunkHeader, parse_hunk_header};
pub use hunk::{DiffHunk, PatchDirection};
pub use line::{DiffLine, LineId, LineIdAllocator, LineType};

/// Format a diff for user display with explicit line numbers.
///
/// Only changed lines are listed, each prefixed with the number used to
/// select it: `+N` for additions (new side) and `-N` for deletions (old side).
///
/// ```text
/// flake.nix:
///   +137:       debug = true;
/// ```
pub fn format_diff(diff: &Diff) -> String {
    let mut result = String::new();

    for file_diff in &diff.files {
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(file_diff.path());
        result.push_str(":\n");

        if file_diff.is_binary() {
            result.push_str("  (binary)\n");
            continue;
        }

        for (i, hunk) in file_diff.hunks().iter().enumerate() {
            if i > 0 {
                result.push('\n');
            }
            for line in hunk.lines() {
                match (line.line_type, line.old_line, line.new_line) {
                    (LineType::Deletion, Some(n), _) => {
                        result.push_str(&format!("  -{}:\t{}\n", n, line.content));
                    }
                    (LineType::Addition, _, Some(n)) => {
                        result.push_str(&format!("  +{}:\t{}\n", n, line.content));
                    }
                    _ => {}
                }
            }
        }
    }

    result
}
