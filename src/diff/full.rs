//! Whole `git diff` output split into per-file diffs.

use super::file::FileDiff;
use super::hunk::PatchDirection;
use super::line::{LineId, LineIdAllocator};
use std::collections::HashSet;
use tracing::debug;

/// A complete git diff containing changes for multiple files
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diff {
    pub files: Vec<FileDiff>,
}

impl Diff {
    /// Parse complete `git diff` output into file diffs
    pub fn parse(text: &str, ids: &LineIdAllocator) -> Self {
        let mut files = Vec::new();
        let mut current_file_text = String::new();

        for line in text.lines() {
            if is_file_start(line) {
                // Start of new file diff - save previous if exists
                push_file(&mut files, &current_file_text, ids);
                current_file_text = line.to_string();
                current_file_text.push('\n');
            } else if !current_file_text.is_empty() {
                current_file_text.push_str(line);
                current_file_text.push('\n');
            }
        }

        // Don't forget the last file
        push_file(&mut files, &current_file_text, ids);

        Diff { files }
    }

    /// The file with the given (new) path
    pub fn file(&self, path: &str) -> Option<&FileDiff> {
        self.files.iter().find(|f| f.path() == path)
    }

    pub fn additions(&self) -> usize {
        self.files.iter().map(FileDiff::additions).sum()
    }

    pub fn deletions(&self) -> usize {
        self.files.iter().map(FileDiff::deletions).sum()
    }

    /// Concatenated per-file patches for every file with a selected change
    pub fn patch(&self, selected: &HashSet<LineId>, direction: PatchDirection) -> Option<String> {
        let patch: String = self
            .files
            .iter()
            .filter_map(|file| file.patch(selected, direction))
            .collect();
        (!patch.is_empty()).then_some(patch)
    }
}

fn is_file_start(line: &str) -> bool {
    line.starts_with("diff --git ") || line.starts_with("diff --cc ") || line.starts_with("diff --combined ")
}

fn push_file(files: &mut Vec<FileDiff>, text: &str, ids: &LineIdAllocator) {
    if text.is_empty() {
        return;
    }
    match FileDiff::parse(text, ids) {
        Some(file_diff) => files.push(file_diff),
        None => debug!(
            header = text.lines().next().unwrap_or_default(),
            "skipping file section without a path"
        ),
    }
}

impl std::fmt::Display for Diff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for file_diff in &self.files {
            write!(f, "{}", file_diff)?;
        }
        Ok(())
    }
}
