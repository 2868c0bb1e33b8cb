//! One file's section of a diff: extended headers, hunks and file-level patches.

use super::hunk::{DiffHunk, PatchDirection, file_header};
use super::line::{DiffLine, LineId, LineIdAllocator, LineType};
use std::collections::HashSet;
use std::fmt;
use std::iter::Peekable;
use tracing::debug;

/// How a file changed between the two sides of a diff.
///
/// Declaration order is the order used when sorting by change type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ChangeType {
    Added,
    #[default]
    Modified,
    Deleted,
    Renamed,
    Copied,
    /// Merge conflict
    Unmerged,
    TypeChanged,
    Untracked,
    Ignored,
}

impl ChangeType {
    /// Map a git status letter (`git status --porcelain`, `git diff --name-status`)
    pub fn from_status(letter: char) -> Option<Self> {
        Some(match letter {
            'A' => ChangeType::Added,
            'M' => ChangeType::Modified,
            'D' => ChangeType::Deleted,
            'R' => ChangeType::Renamed,
            'C' => ChangeType::Copied,
            'U' => ChangeType::Unmerged,
            'T' => ChangeType::TypeChanged,
            '?' => ChangeType::Untracked,
            '!' => ChangeType::Ignored,
            _ => return None,
        })
    }

    pub fn status_letter(self) -> char {
        match self {
            ChangeType::Added => 'A',
            ChangeType::Modified => 'M',
            ChangeType::Deleted => 'D',
            ChangeType::Renamed => 'R',
            ChangeType::Copied => 'C',
            ChangeType::Unmerged => 'U',
            ChangeType::TypeChanged => 'T',
            ChangeType::Untracked => '?',
            ChangeType::Ignored => '!',
        }
    }
}

/// File-level metadata as reported by git
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMeta {
    pub path: String,
    pub old_path: Option<String>,
    pub change_type: ChangeType,
    pub is_binary: bool,
    pub old_mode: Option<String>,
    pub new_mode: Option<String>,
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,
    /// 0-100, only meaningful for renames and copies
    pub similarity: Option<u8>,
}

impl FileMeta {
    pub fn new(path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
            ..Self::default()
        }
    }
}

/// All changes to one file.
///
/// Binary files never carry hunks. Addition and deletion totals are
/// computed once when the value is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    meta: FileMeta,
    hunks: Vec<DiffHunk>,
    additions: usize,
    deletions: usize,
}

impl FileDiff {
    pub fn new(mut meta: FileMeta, mut hunks: Vec<DiffHunk>) -> Self {
        if meta.is_binary {
            hunks.clear();
        }
        if !matches!(meta.change_type, ChangeType::Renamed | ChangeType::Copied) {
            meta.old_path = None;
        }
        meta.similarity = meta.similarity.map(|s| s.min(100));

        let additions = hunks.iter().map(DiffHunk::additions).sum();
        let deletions = hunks.iter().map(DiffHunk::deletions).sum();
        Self {
            meta,
            hunks,
            additions,
            deletions,
        }
    }

    /// Build from metadata supplied separately and the diff text of one file.
    ///
    /// Everything before the first hunk header is ignored.
    pub fn parse_with_meta(meta: FileMeta, text: &str, ids: &LineIdAllocator) -> Self {
        let hunks = parse_hunks(&mut text.lines().peekable(), ids);
        Self::new(meta, hunks)
    }

    /// Parse one file section of `git diff` output, starting at its
    /// `diff --git` (or `diff --cc`) line.
    ///
    /// Returns `None` if no path can be found.
    pub fn parse(text: &str, ids: &LineIdAllocator) -> Option<Self> {
        let mut lines = text.lines().peekable();
        let first = lines.next()?;

        let mut meta = FileMeta::default();
        let mut renamed_or_copied = false;
        if let Some(paths) = first.strip_prefix("diff --git ") {
            let (old, new) = split_git_paths(paths);
            meta.path = new;
            if old != meta.path {
                meta.old_path = Some(old);
            }
        } else if let Some(path) = first
            .strip_prefix("diff --cc ")
            .or_else(|| first.strip_prefix("diff --combined "))
        {
            meta.path = unquote(path).to_string();
            meta.change_type = ChangeType::Unmerged;
        } else {
            return None;
        }

        while let Some(&line) = lines.peek() {
            if line.starts_with("@@") {
                break;
            }
            lines.next();

            if let Some(mode) = line.strip_prefix("new file mode ") {
                meta.change_type = ChangeType::Added;
                meta.new_mode = Some(mode.to_string());
            } else if let Some(mode) = line.strip_prefix("deleted file mode ") {
                meta.change_type = ChangeType::Deleted;
                meta.old_mode = Some(mode.to_string());
            } else if let Some(mode) = line.strip_prefix("old mode ") {
                meta.old_mode = Some(mode.to_string());
            } else if let Some(mode) = line.strip_prefix("new mode ") {
                meta.new_mode = Some(mode.to_string());
            } else if let Some(percent) = line.strip_prefix("similarity index ") {
                meta.similarity = percent.trim_end_matches('%').parse().ok();
            } else if let Some(path) = line.strip_prefix("rename from ") {
                meta.change_type = ChangeType::Renamed;
                meta.old_path = Some(unquote(path).to_string());
                renamed_or_copied = true;
            } else if let Some(path) = line.strip_prefix("rename to ") {
                meta.path = unquote(path).to_string();
            } else if let Some(path) = line.strip_prefix("copy from ") {
                meta.change_type = ChangeType::Copied;
                meta.old_path = Some(unquote(path).to_string());
                renamed_or_copied = true;
            } else if let Some(path) = line.strip_prefix("copy to ") {
                meta.path = unquote(path).to_string();
            } else if let Some(index) = line.strip_prefix("index ") {
                parse_index_line(index, &mut meta);
            } else if line.starts_with("Binary files ") || line == "GIT binary patch" {
                meta.is_binary = true;
            } else if line == "--- /dev/null" {
                meta.change_type = ChangeType::Added;
            } else if line == "+++ /dev/null" {
                meta.change_type = ChangeType::Deleted;
            }
        }

        if !renamed_or_copied && meta.change_type == ChangeType::Modified && has_type_change(&meta) {
            meta.change_type = ChangeType::TypeChanged;
        }
        if meta.path.is_empty() {
            return None;
        }

        let hunks = parse_hunks(&mut lines, ids);
        Some(Self::new(meta, hunks))
    }

    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    pub fn path(&self) -> &str {
        &self.meta.path
    }

    pub fn old_path(&self) -> Option<&str> {
        self.meta.old_path.as_deref()
    }

    pub fn change_type(&self) -> ChangeType {
        self.meta.change_type
    }

    pub fn is_binary(&self) -> bool {
        self.meta.is_binary
    }

    pub fn similarity(&self) -> Option<u8> {
        self.meta.similarity
    }

    pub fn hunks(&self) -> &[DiffHunk] {
        &self.hunks
    }

    pub fn additions(&self) -> usize {
        self.additions
    }

    pub fn deletions(&self) -> usize {
        self.deletions
    }

    /// The final path component
    pub fn file_name(&self) -> &str {
        file_name(&self.meta.path)
    }

    pub fn is_pure_rename(&self) -> bool {
        self.meta.change_type == ChangeType::Renamed && self.meta.similarity == Some(100)
    }

    pub fn is_rename_with_changes(&self) -> bool {
        self.meta.change_type == ChangeType::Renamed
            && self.meta.similarity.is_some_and(|s| s < 100)
    }

    pub fn is_pure_copy(&self) -> bool {
        self.meta.change_type == ChangeType::Copied && self.meta.similarity == Some(100)
    }

    pub fn has_mode_change(&self) -> bool {
        matches!(
            (&self.meta.old_mode, &self.meta.new_mode),
            (Some(old), Some(new)) if old != new
        )
    }

    pub fn is_generated(&self) -> bool {
        is_generated_path(&self.meta.path)
    }

    pub fn is_lockfile(&self) -> bool {
        is_lockfile_path(&self.meta.path)
    }

    /// Every line of the file in display order: a header row naming the
    /// file, then each hunk's header followed by its lines.
    pub fn rows(&self, ids: &LineIdAllocator) -> Vec<DiffLine> {
        let title = match &self.meta.old_path {
            Some(old) => format!("{old} → {}", self.meta.path),
            None => self.meta.path.clone(),
        };
        let mut rows = vec![DiffLine::new(LineType::Header, title, None, None, ids)];
        for hunk in &self.hunks {
            rows.push(DiffLine::new(
                LineType::HunkHeader,
                hunk.raw_header(),
                None,
                None,
                ids,
            ));
            rows.extend(hunk.lines().iter().cloned());
        }
        rows
    }

    /// One patch for all selected lines of this file.
    ///
    /// Each retained hunk keeps its position on the side the patch is applied
    /// to; the other side is shifted by the net line delta of the hunks
    /// retained before it. Returns `None` if nothing is selected.
    pub fn patch(&self, selected: &HashSet<LineId>, direction: PatchDirection) -> Option<String> {
        if self.meta.is_binary {
            return None;
        }

        let mut delta: i64 = 0;
        let mut body = String::new();
        for hunk in &self.hunks {
            let Some(kept) = hunk.retain(selected, direction) else {
                continue;
            };
            let placed = match direction {
                PatchDirection::Stage => {
                    let new_start = shifted_start(kept.old_start(), kept.old_count(), kept.new_count(), delta);
                    delta += i64::from(kept.new_count()) - i64::from(kept.old_count());
                    kept.moved_to(kept.old_start(), new_start)
                }
                PatchDirection::Unstage => {
                    let old_start = shifted_start(kept.new_start(), kept.new_count(), kept.old_count(), delta);
                    delta += i64::from(kept.old_count()) - i64::from(kept.new_count());
                    kept.moved_to(old_start, kept.new_start())
                }
            };
            body.push_str(&placed.to_string());
        }

        if body.is_empty() {
            debug!(path = %self.meta.path, "selection yields no patch");
            return None;
        }
        Some(file_header(&self.meta.path) + &body)
    }
}

/// Start of the opposite side of a hunk anchored at `anchor_start`
fn shifted_start(anchor_start: u32, anchor_count: u32, other_count: u32, delta: i64) -> u32 {
    let first = i64::from(anchor_start) + i64::from(anchor_count == 0) + delta;
    let start = if other_count == 0 { first - 1 } else { first };
    u32::try_from(start.max(0)).unwrap_or(u32::MAX)
}

/// Parse every hunk remaining in `lines`, skipping anything outside a hunk
pub(crate) fn parse_hunks<'a, I>(lines: &mut Peekable<I>, ids: &LineIdAllocator) -> Vec<DiffHunk>
where
    I: Iterator<Item = &'a str>,
{
    let mut hunks = Vec::new();
    while let Some(line) = lines.next() {
        if !line.starts_with("@@") {
            continue;
        }
        match DiffHunk::parse_body(line, lines, ids) {
            Some(hunk) => hunks.push(hunk),
            None => debug!(header = line, "skipping unparseable hunk header"),
        }
    }
    hunks
}

/// Split `a/<old> b/<new>` from a `diff --git` line
fn split_git_paths(paths: &str) -> (String, String) {
    let (old, new) = match paths.rfind(" b/").or_else(|| paths.rfind(" \"b/")) {
        Some(idx) => (&paths[..idx], &paths[idx + 1..]),
        None => paths.split_once(' ').unwrap_or((paths, paths)),
    };
    (strip_side(old).to_string(), strip_side(new).to_string())
}

fn strip_side(path: &str) -> &str {
    let path = unquote(path);
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

fn unquote(path: &str) -> &str {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
}

/// `index <old>..<new>[ <mode>]`
fn parse_index_line(index: &str, meta: &mut FileMeta) {
    let (hashes, mode) = match index.split_once(' ') {
        Some((hashes, mode)) => (hashes, Some(mode)),
        None => (index, None),
    };
    if let Some((old, new)) = hashes.split_once("..") {
        meta.old_hash = Some(old.to_string());
        meta.new_hash = Some(new.to_string());
    }
    if let Some(mode) = mode {
        meta.old_mode.get_or_insert_with(|| mode.to_string());
        meta.new_mode.get_or_insert_with(|| mode.to_string());
    }
}

/// Old and new modes name different object kinds (file, symlink, submodule)
fn has_type_change(meta: &FileMeta) -> bool {
    match (&meta.old_mode, &meta.new_mode) {
        (Some(old), Some(new)) => old.get(..3) != new.get(..3),
        _ => false,
    }
}

pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

const LOCKFILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "bun.lock",
    "Gemfile.lock",
    "Podfile.lock",
    "Package.resolved",
    "composer.lock",
    "poetry.lock",
    "Pipfile.lock",
    "uv.lock",
    "go.sum",
    "flake.lock",
    "mix.lock",
    "pubspec.lock",
    "packages.lock.json",
    "gradle.lockfile",
];

const GENERATED_SUFFIXES: &[&str] = &[
    ".min.js",
    ".min.css",
    ".js.map",
    ".css.map",
    ".pb.go",
    ".pb.swift",
    "_pb2.py",
    "_pb2_grpc.py",
    ".g.dart",
    ".freezed.dart",
    ".designer.cs",
    ".g.cs",
    "_generated.go",
    ".pbxproj",
];

const GENERATED_DIRS: &[&str] = &["generated", "__generated__", "node_modules", "dist"];

/// Lockfiles of common package managers, matched by file name
pub fn is_lockfile_path(path: &str) -> bool {
    LOCKFILES.contains(&file_name(path))
}

/// Build outputs and generated sources, matched by name or directory
pub fn is_generated_path(path: &str) -> bool {
    let name = file_name(path);
    GENERATED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        || name.contains(".generated.")
        || path
            .split('/')
            .rev()
            .skip(1)
            .any(|dir| GENERATED_DIRS.contains(&dir))
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let old = self.meta.old_path.as_deref().unwrap_or(&self.meta.path);
        writeln!(f, "diff --git a/{} b/{}", old, self.meta.path)?;
        match self.meta.change_type {
            ChangeType::Added => writeln!(f, "--- /dev/null")?,
            _ => writeln!(f, "--- a/{old}")?,
        }
        match self.meta.change_type {
            ChangeType::Deleted => writeln!(f, "+++ /dev/null")?,
            _ => writeln!(f, "+++ b/{}", self.meta.path)?,
        }

        for hunk in &self.hunks {
            write!(f, "{hunk}")?;
        }

        Ok(())
    }
}
