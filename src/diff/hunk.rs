//! Hunks of a unified diff.
//!
//! A hunk body is read by the counts its header declares, so a `-`/`+` line
//! past the end of the body is never mistaken for hunk content. `retain`
//! builds the partial hunks used for staging and unstaging single lines.

use super::header::{HunkHeader, parse_hunk_header};
use super::line::{DiffLine, LineId, LineIdAllocator, LineType};
use std::collections::HashSet;
use std::fmt;
use std::iter::Peekable;
use tracing::{debug, trace, warn};

/// Which snapshot a selective patch is built against.
///
/// Staging applies the patch forward to the index, so unselected deletions
/// stay in the target as context and unselected additions do not exist yet.
/// Unstaging reverse-applies a patch of the staged diff, so the roles flip:
/// unselected additions are already in the index and stay as context while
/// unselected deletions are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchDirection {
    #[default]
    Stage,
    Unstage,
}

/// A contiguous block of diff lines under one `@@` header.
///
/// Counts are always derived from the lines, never taken on trust from a
/// header, so `old_count` is the number of context and deletion lines and
/// `new_count` the number of context and addition lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    old_start: u32,
    old_count: u32,
    new_start: u32,
    new_count: u32,
    header: String,
    raw_header: String,
    lines: Vec<DiffLine>,
    additions: usize,
    deletions: usize,
}

impl DiffHunk {
    /// Build a hunk from its lines; counts and the raw header are computed here.
    pub fn new(old_start: u32, new_start: u32, header: impl Into<String>, lines: Vec<DiffLine>) -> Self {
        let header = header.into();
        let (old_count, new_count) = side_counts(&lines);
        let raw_header = HunkHeader {
            old_start,
            old_count,
            new_start,
            new_count,
            header: header.clone(),
        }
        .to_string();
        Self::assemble(old_start, new_start, header, raw_header, lines)
    }

    fn assemble(
        old_start: u32,
        new_start: u32,
        header: String,
        raw_header: String,
        lines: Vec<DiffLine>,
    ) -> Self {
        let (old_count, new_count) = side_counts(&lines);
        let additions = lines.iter().filter(|l| l.line_type == LineType::Addition).count();
        let deletions = lines.iter().filter(|l| l.line_type == LineType::Deletion).count();
        Self {
            old_start,
            old_count,
            new_start,
            new_count,
            header,
            raw_header,
            lines,
            additions,
            deletions,
        }
    }

    /// Parse a hunk from diff text (header line followed by its body)
    pub fn parse(text: &str, ids: &LineIdAllocator) -> Option<Self> {
        let mut lines = text.lines().peekable();
        let header = lines.next()?;
        Self::parse_body(header, &mut lines, ids)
    }

    /// Parse the body following `header_line`, consuming exactly as many lines
    /// as the header's counts call for (plus any no-newline markers).
    pub(crate) fn parse_body<'a, I>(
        header_line: &str,
        lines: &mut Peekable<I>,
        ids: &LineIdAllocator,
    ) -> Option<Self>
    where
        I: Iterator<Item = &'a str>,
    {
        let parsed = parse_hunk_header(header_line)?;

        // `None` once numbering has run past `u32::MAX`
        let mut old_line = Some(parsed.old_start);
        let mut new_line = Some(parsed.new_start);
        let mut old_seen = 0u32;
        let mut new_seen = 0u32;
        let mut body: Vec<DiffLine> = Vec::new();

        while let Some(&line) = lines.peek() {
            if line.starts_with('\\') {
                if let Some(last) = body.last_mut() {
                    last.has_newline = false;
                }
                lines.next();
                continue;
            }
            if old_seen >= parsed.old_count && new_seen >= parsed.new_count {
                break;
            }

            let mut chars = line.chars();
            let marker = chars.next();
            let content = chars.as_str();
            let (line_type, uses_old, uses_new) = match marker {
                // Some tools strip the single space from blank context lines
                Some(' ') | None => (LineType::Context, true, true),
                Some('-') => (LineType::Deletion, true, false),
                Some('+') => (LineType::Addition, false, true),
                Some(_) => break,
            };
            let old = if uses_old { Some(take_number(&mut old_line, header_line)?) } else { None };
            let new = if uses_new { Some(take_number(&mut new_line, header_line)?) } else { None };
            old_seen = old_seen.saturating_add(u32::from(uses_old));
            new_seen = new_seen.saturating_add(u32::from(uses_new));

            let mut diff_line = DiffLine::new(line_type, content, old, new, ids);
            diff_line.raw_line = line.to_string();
            body.push(diff_line);
            lines.next();
        }

        if old_seen != parsed.old_count || new_seen != parsed.new_count {
            warn!(
                header = header_line,
                old_seen, new_seen, "hunk body does not match its header counts"
            );
            return Some(Self::new(parsed.old_start, parsed.new_start, parsed.header, body));
        }

        Some(Self::assemble(
            parsed.old_start,
            parsed.new_start,
            parsed.header,
            header_line.to_string(),
            body,
        ))
    }

    pub fn old_start(&self) -> u32 {
        self.old_start
    }

    pub fn old_count(&self) -> u32 {
        self.old_count
    }

    pub fn new_start(&self) -> u32 {
        self.new_start
    }

    pub fn new_count(&self) -> u32 {
        self.new_count
    }

    /// Trailing header text, e.g. the enclosing function
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn raw_header(&self) -> &str {
        &self.raw_header
    }

    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    pub fn additions(&self) -> usize {
        self.additions
    }

    pub fn deletions(&self) -> usize {
        self.deletions
    }

    /// Ids of every addition and deletion, for selecting the whole hunk
    pub fn change_ids(&self) -> impl Iterator<Item = LineId> + '_ {
        self.lines
            .iter()
            .filter(|l| l.line_type.is_change())
            .map(DiffLine::id)
    }

    /// This hunk as a standalone patch against `path`
    pub fn to_patch(&self, path: &str) -> String {
        let mut out = file_header(path);
        out.push_str(&self.to_string());
        out
    }

    /// A patch carrying only the selected changes.
    ///
    /// Returns `None` when the selection leaves no addition or deletion.
    pub fn patch(
        &self,
        path: &str,
        selected: &HashSet<LineId>,
        direction: PatchDirection,
    ) -> Option<String> {
        self.retain(selected, direction).map(|hunk| hunk.to_patch(path))
    }

    /// The display slice of this hunk holding only the selected changes.
    ///
    /// Unselected deletions stay as context, unselected additions are dropped.
    /// Returns `None` when no change is selected.
    pub fn sub_hunk(&self, selected: &HashSet<LineId>) -> Option<Self> {
        self.retain(selected, PatchDirection::Stage)
    }

    /// Rebuild the hunk keeping selected changes and converting or dropping
    /// the rest according to `direction`.
    pub(crate) fn retain(&self, selected: &HashSet<LineId>, direction: PatchDirection) -> Option<Self> {
        let kept: Vec<(&DiffLine, LineType)> = self
            .lines
            .iter()
            .filter_map(|line| {
                let chosen = selected.contains(&line.id());
                let kind = match (line.line_type, chosen, direction) {
                    (LineType::Context, _, _) => LineType::Context,
                    (kind @ (LineType::Addition | LineType::Deletion), true, _) => kind,
                    (LineType::Deletion, false, PatchDirection::Stage)
                    | (LineType::Addition, false, PatchDirection::Unstage) => LineType::Context,
                    (LineType::Addition, false, PatchDirection::Stage)
                    | (LineType::Deletion, false, PatchDirection::Unstage)
                    | (LineType::HunkHeader | LineType::Header, _, _) => return None,
                };
                Some((line, kind))
            })
            .collect();

        if !kept.iter().any(|(_, kind)| kind.is_change()) {
            trace!(raw_header = %self.raw_header, "selection leaves no changes in hunk");
            return None;
        }

        let old_count = kept.iter().filter(|(_, k)| *k != LineType::Addition).count() as u32;
        let new_count = kept.iter().filter(|(_, k)| *k != LineType::Deletion).count() as u32;
        let old_start = rebase_start(self.old_start, self.old_count, old_count);
        let new_start = rebase_start(self.new_start, self.new_count, new_count);

        let lines = number_lines(kept.into_iter(), old_start, new_start);
        Some(Self::new(old_start, new_start, self.header.clone(), lines))
    }

    /// The same lines placed at different start positions
    pub(crate) fn moved_to(&self, old_start: u32, new_start: u32) -> Self {
        let lines = number_lines(
            self.lines.iter().map(|line| (line, line.line_type)),
            old_start,
            new_start,
        );
        Self::new(old_start, new_start, self.header.clone(), lines)
    }
}

/// Hand out the current line number and advance, failing once past `u32::MAX`
fn take_number(next: &mut Option<u32>, header_line: &str) -> Option<u32> {
    let Some(number) = *next else {
        debug!(header = header_line, "hunk line numbers overflow");
        return None;
    };
    *next = number.checked_add(1);
    Some(number)
}

/// `--- a/<path>` and `+++ b/<path>` lines
pub(crate) fn file_header(path: &str) -> String {
    format!("--- a/{path}\n+++ b/{path}\n")
}

fn side_counts(lines: &[DiffLine]) -> (u32, u32) {
    lines.iter().fold((0, 0), |(old, new), line| match line.line_type {
        LineType::Context => (old + 1, new + 1),
        LineType::Deletion => (old + 1, new),
        LineType::Addition => (old, new + 1),
        LineType::HunkHeader | LineType::Header => (old, new),
    })
}

/// A zero-length range names the line *before* the change, while a non-empty
/// range names its first line; shift the start when a side changes between
/// the two.
fn rebase_start(start: u32, original_count: u32, count: u32) -> u32 {
    match (original_count, count) {
        (0, c) if c > 0 => start.saturating_add(1),
        (c, 0) if c > 0 => start.saturating_sub(1),
        _ => start,
    }
}

fn number_lines<'a>(
    lines: impl Iterator<Item = (&'a DiffLine, LineType)>,
    old_start: u32,
    new_start: u32,
) -> Vec<DiffLine> {
    let mut old_line = old_start;
    let mut new_line = new_start;
    lines
        .map(|(line, kind)| {
            let old = (kind != LineType::Addition).then_some(old_line);
            let new = (kind != LineType::Deletion).then_some(new_line);
            old_line = old_line.saturating_add(u32::from(old.is_some()));
            new_line = new_line.saturating_add(u32::from(new.is_some()));
            line.retyped(kind, old, new)
        })
        .collect()
}

impl fmt::Display for DiffHunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body = String::new();
        for line in &self.lines {
            line.write_patch_line(&mut body);
        }
        writeln!(f, "{}", self.raw_header)?;
        f.write_str(&body)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::diff::parse_hunk_header;
    use proptest::prelude::*;

    fn arb_line_content() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::char::range(' ', '~'), 0..20)
            .prop_map(|chars| chars.into_iter().collect())
    }

    fn arb_kind() -> impl Strategy<Value = LineType> {
        prop_oneof![
            Just(LineType::Context),
            Just(LineType::Addition),
            Just(LineType::Deletion),
        ]
    }

    /// A hunk of random kinds with correctly numbered lines
    fn arb_hunk() -> impl Strategy<Value = DiffHunk> {
        (
            1..500u32,
            1..500u32,
            prop::collection::vec((arb_kind(), arb_line_content()), 1..16),
        )
            .prop_map(|(old_start, new_start, kinds)| {
                let (mut old, mut new) = (old_start, new_start);
                let lines = kinds
                    .into_iter()
                    .map(|(kind, content)| match kind {
                        LineType::Addition => {
                            new += 1;
                            DiffLine::addition(content, new - 1)
                        }
                        LineType::Deletion => {
                            old += 1;
                            DiffLine::deletion(content, old - 1)
                        }
                        _ => {
                            old += 1;
                            new += 1;
                            DiffLine::context(content, old - 1, new - 1)
                        }
                    })
                    .collect();
                DiffHunk::new(old_start, new_start, "", lines)
            })
    }

    fn assert_counts(hunk: &DiffHunk) -> Result<(), TestCaseError> {
        let old = hunk.lines().iter().filter(|l| l.line_type != LineType::Addition).count();
        let new = hunk.lines().iter().filter(|l| l.line_type != LineType::Deletion).count();
        prop_assert_eq!(hunk.old_count() as usize, old);
        prop_assert_eq!(hunk.new_count() as usize, new);
        Ok(())
    }

    proptest! {
        /// The raw header of any hunk parses back to its own ranges
        #[test]
        fn raw_header_roundtrips(hunk in arb_hunk()) {
            let parsed = parse_hunk_header(hunk.raw_header()).unwrap_or_else(|| HunkHeader {
                old_start: u32::MAX, old_count: 0, new_start: 0, new_count: 0, header: String::new(),
            });
            prop_assert_eq!(parsed.old_start, hunk.old_start());
            prop_assert_eq!(parsed.old_count, hunk.old_count());
            prop_assert_eq!(parsed.new_start, hunk.new_start());
            prop_assert_eq!(parsed.new_count, hunk.new_count());
        }

        /// Counts match line kinds for source and derived hunks alike
        #[test]
        fn counts_hold_after_selection(
            hunk in arb_hunk(),
            picks in prop::collection::vec(any::<bool>(), 16),
        ) {
            assert_counts(&hunk)?;
            let selected: HashSet<LineId> = hunk
                .change_ids()
                .zip(picks.iter())
                .filter(|(_, pick)| **pick)
                .map(|(id, _)| id)
                .collect();
            for direction in [PatchDirection::Stage, PatchDirection::Unstage] {
                if let Some(derived) = hunk.retain(&selected, direction) {
                    assert_counts(&derived)?;
                    prop_assert!(derived.additions() + derived.deletions() > 0);
                }
            }
        }

        /// Rendered hunks parse back to the same lines
        #[test]
        fn rendered_hunk_reparses(hunk in arb_hunk()) {
            let reparsed = DiffHunk::parse(&hunk.to_string(), &LineIdAllocator::new());
            prop_assert_eq!(reparsed, Some(hunk));
        }
    }
}
