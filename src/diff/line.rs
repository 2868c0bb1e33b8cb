//! Single diff lines and their identities.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Semantic kind of a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineType {
    Context,
    Addition,
    Deletion,
    /// The `@@ ... @@` line opening a hunk
    HunkHeader,
    /// File-level header lines (`diff --git`, `index`, `---`, `+++`, ...)
    Header,
}

impl LineType {
    /// The one-character marker this line carries in patch text
    pub fn prefix(self) -> Option<char> {
        match self {
            LineType::Context => Some(' '),
            LineType::Addition => Some('+'),
            LineType::Deletion => Some('-'),
            LineType::HunkHeader | LineType::Header => None,
        }
    }

    pub fn is_change(self) -> bool {
        matches!(self, LineType::Addition | LineType::Deletion)
    }
}

/// Stable identity of a line within one diff.
///
/// Derived from line coordinates, so re-parsing the same diff yields the
/// same ids. Ids from unrelated diffs may collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineId {
    Both { old: u32, new: u32 },
    Old(u32),
    New(u32),
    Unnumbered(u64),
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineId::Both { old, new } => write!(f, "{old}:{new}"),
            LineId::Old(n) => write!(f, "-{n}"),
            LineId::New(n) => write!(f, "+{n}"),
            LineId::Unnumbered(k) => write!(f, "#{k}"),
        }
    }
}

/// Hands out ids for lines that have no line number at all.
///
/// Shared by reference across parsers; safe to use from several threads.
#[derive(Debug, Default)]
pub struct LineIdAllocator {
    next: Mutex<u64>,
}

impl LineIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for a line with the given coordinates
    pub fn id_for(&self, old_line: Option<u32>, new_line: Option<u32>) -> LineId {
        match (old_line, new_line) {
            (Some(old), Some(new)) => LineId::Both { old, new },
            (Some(old), None) => LineId::Old(old),
            (None, Some(new)) => LineId::New(new),
            (None, None) => LineId::Unnumbered(self.next_unnumbered()),
        }
    }

    fn next_unnumbered(&self) -> u64 {
        // A poisoned counter is still a valid counter
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let id = *next;
        *next += 1;
        id
    }

    /// Restart numbering at zero
    pub fn reset(&self) {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner) = 0;
    }
}

/// One line of a diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    id: LineId,
    pub line_type: LineType,
    /// Text without the leading marker
    pub content: String,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    /// False when git reported `\ No newline at end of file` after this line
    pub has_newline: bool,
    /// The line as it appeared in the diff, marker included
    pub raw_line: String,
}

impl DiffLine {
    pub fn new(
        line_type: LineType,
        content: impl Into<String>,
        old_line: Option<u32>,
        new_line: Option<u32>,
        ids: &LineIdAllocator,
    ) -> Self {
        let content = content.into();
        let raw_line = match line_type.prefix() {
            Some(prefix) => format!("{prefix}{content}"),
            None => content.clone(),
        };
        Self {
            id: ids.id_for(old_line, new_line),
            line_type,
            content,
            old_line,
            new_line,
            has_newline: true,
            raw_line,
        }
    }

    pub fn context(content: impl Into<String>, old: u32, new: u32) -> Self {
        Self::numbered(LineType::Context, content, Some(old), Some(new))
    }

    pub fn addition(content: impl Into<String>, new: u32) -> Self {
        Self::numbered(LineType::Addition, content, None, Some(new))
    }

    pub fn deletion(content: impl Into<String>, old: u32) -> Self {
        Self::numbered(LineType::Deletion, content, Some(old), None)
    }

    // Numbered lines never touch the allocator, so a throwaway one is fine
    fn numbered(
        line_type: LineType,
        content: impl Into<String>,
        old_line: Option<u32>,
        new_line: Option<u32>,
    ) -> Self {
        Self::new(line_type, content, old_line, new_line, &LineIdAllocator::new())
    }

    /// Mark this line as lacking a trailing newline
    #[must_use]
    pub fn without_newline(mut self) -> Self {
        self.has_newline = false;
        self
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    /// The same text re-typed and re-numbered (used when deriving hunks)
    pub(crate) fn retyped(&self, line_type: LineType, old: Option<u32>, new: Option<u32>) -> Self {
        let mut line = Self::numbered(line_type, self.content.clone(), old, new);
        line.has_newline = self.has_newline;
        line
    }

    /// Append this line in patch form, including the no-newline marker
    pub(crate) fn write_patch_line(&self, out: &mut String) {
        if let Some(prefix) = self.line_type.prefix() {
            out.push(prefix);
        }
        out.push_str(&self.content);
        out.push('\n');
        if !self.has_newline {
            out.push_str(NO_NEWLINE_MARKER);
            out.push('\n');
        }
    }
}

pub(crate) const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";
