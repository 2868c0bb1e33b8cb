//! Word-level differences between a deleted line and the line that replaced it.
//!
//! Lines are split into tokens where each run of alphanumeric or underscore
//! characters is one token and every other character (whitespace included)
//! stands alone. Tokens are aligned with a longest-common-subsequence match.

use crate::diff::{DiffHunk, DiffLine, LineType};
use similar::{Algorithm, DiffTag, capture_diff_slices};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Unchanged,
    Added,
    Removed,
}

/// A run of text sharing one highlight kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordSegment {
    pub kind: SegmentKind,
    pub text: String,
}

impl WordSegment {
    pub fn new(kind: SegmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split a line into word and single-character tokens
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut word_start = None;

    for (i, c) in text.char_indices() {
        if is_word_char(c) {
            word_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = word_start.take() {
            tokens.push(&text[start..i]);
        }
        tokens.push(&text[i..i + c.len_utf8()]);
    }
    if let Some(start) = word_start {
        tokens.push(&text[start..]);
    }

    tokens
}

/// Segments covering both lines: unchanged text, text only in `old`
/// (removed) and text only in `new` (added), in reading order.
///
/// Identical inputs give a single unchanged segment.
pub fn diff_words(old: &str, new: &str) -> Vec<WordSegment> {
    if old == new {
        return vec![WordSegment::new(SegmentKind::Unchanged, new)];
    }

    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);
    let mut segments = Vec::new();

    for op in capture_diff_slices(Algorithm::Lcs, &old_tokens, &new_tokens) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => push(&mut segments, SegmentKind::Unchanged, &new_tokens[new_range]),
            DiffTag::Delete => push(&mut segments, SegmentKind::Removed, &old_tokens[old_range]),
            DiffTag::Insert => push(&mut segments, SegmentKind::Added, &new_tokens[new_range]),
            DiffTag::Replace => {
                push(&mut segments, SegmentKind::Removed, &old_tokens[old_range]);
                push(&mut segments, SegmentKind::Added, &new_tokens[new_range]);
            }
        }
    }

    segments
}

fn push(segments: &mut Vec<WordSegment>, kind: SegmentKind, tokens: &[&str]) {
    if tokens.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(last) if last.kind == kind => last.text.push_str(&tokens.concat()),
        _ => segments.push(WordSegment::new(kind, tokens.concat())),
    }
}

/// The segments to draw on the deletion line
pub fn old_segments(segments: &[WordSegment]) -> Vec<WordSegment> {
    side(segments, SegmentKind::Added)
}

/// The segments to draw on the addition line
pub fn new_segments(segments: &[WordSegment]) -> Vec<WordSegment> {
    side(segments, SegmentKind::Removed)
}

fn side(segments: &[WordSegment], skip: SegmentKind) -> Vec<WordSegment> {
    let mut out: Vec<WordSegment> = Vec::new();
    for segment in segments.iter().filter(|s| s.kind != skip) {
        match out.last_mut() {
            Some(last) if last.kind == segment.kind => last.text.push_str(&segment.text),
            _ => out.push(segment.clone()),
        }
    }
    out
}

/// Deletion/addition pairs worth word-diffing.
///
/// Within each run of deletions directly followed by additions, the n-th
/// deletion pairs with the n-th addition; surplus lines stay unpaired.
pub fn pair_lines(hunk: &DiffHunk) -> Vec<(&DiffLine, &DiffLine)> {
    let lines = hunk.lines();
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].line_type != LineType::Deletion {
            i += 1;
            continue;
        }
        let deletions = i;
        while i < lines.len() && lines[i].line_type == LineType::Deletion {
            i += 1;
        }
        let additions = i;
        while i < lines.len() && lines[i].line_type == LineType::Addition {
            i += 1;
        }
        pairs.extend(lines[deletions..additions].iter().zip(&lines[additions..i]));
    }

    pairs
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::SegmentKind::{Added, Removed, Unchanged};
    use super::*;
    use crate::diff::LineIdAllocator;
    use similar_asserts::assert_eq;

    fn seg(kind: SegmentKind, text: &str) -> WordSegment {
        WordSegment::new(kind, text)
    }

    #[test]
    fn tokenize_words_and_symbols() {
        assert_eq!(
            tokenize("let foo_bar = baz(1);"),
            vec!["let", " ", "foo_bar", " ", "=", " ", "baz", "(", "1", ")", ";"]
        );
    }

    #[test]
    fn tokenize_whitespace_is_per_character() {
        assert_eq!(tokenize("a  b"), vec!["a", " ", " ", "b"]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn tokenize_unicode_words() {
        assert_eq!(tokenize("héllo→wörld"), vec!["héllo", "→", "wörld"]);
    }

    #[test]
    fn identical_lines_single_segment() {
        assert_eq!(diff_words("same line", "same line"), vec![seg(Unchanged, "same line")]);
        assert_eq!(diff_words("", ""), vec![seg(Unchanged, "")]);
    }

    #[test]
    fn changed_word() {
        assert_eq!(
            diff_words("let x = 1;", "let y = 1;"),
            vec![
                seg(Unchanged, "let "),
                seg(Removed, "x"),
                seg(Added, "y"),
                seg(Unchanged, " = 1;"),
            ]
        );
    }

    #[test]
    fn appended_argument() {
        assert_eq!(
            diff_words("call(a)", "call(a, b)"),
            vec![seg(Unchanged, "call(a"), seg(Added, ", b"), seg(Unchanged, ")")]
        );
    }

    #[test]
    fn sides_split_segments() {
        let segments = diff_words("gtk.theme = \"Adwaita\"", "gtk.theme = \"Papirus\"");
        assert_eq!(
            old_segments(&segments),
            vec![
                seg(Unchanged, "gtk.theme = \""),
                seg(Removed, "Adwaita"),
                seg(Unchanged, "\""),
            ]
        );
        assert_eq!(
            new_segments(&segments),
            vec![
                seg(Unchanged, "gtk.theme = \""),
                seg(Added, "Papirus"),
                seg(Unchanged, "\""),
            ]
        );
    }

    #[test]
    fn pair_lines_in_runs() {
        let text = "@@ -1,4 +1,4 @@\n-a1\n-a2\n+b1\n ctx\n-c1\n+d1\n+d2\n";
        let hunk = DiffHunk::parse(text, &LineIdAllocator::new()).unwrap();

        let pairs: Vec<(&str, &str)> = pair_lines(&hunk)
            .into_iter()
            .map(|(old, new)| (old.content.as_str(), new.content.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a1", "b1"), ("c1", "d1")]);
    }

    #[test]
    fn pair_lines_ignores_addition_first_runs() {
        let text = "@@ -1 +1,2 @@\n+new\n-old\n+other\n";
        let hunk = DiffHunk::parse(text, &LineIdAllocator::new()).unwrap();

        let pairs = pair_lines(&hunk);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.content, "old");
        assert_eq!(pairs[0].1.content, "other");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_line() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("foo"),
                Just("bar"),
                Just("_x1"),
                Just(" "),
                Just("("),
                Just(")"),
                Just("="),
                Just("é"),
            ],
            0..12,
        )
        .prop_map(|parts| parts.concat())
    }

    fn text(segments: &[WordSegment]) -> String {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    proptest! {
        /// Each side's segments spell out exactly that side's line
        #[test]
        fn sides_cover_their_lines(old in arb_line(), new in arb_line()) {
            let segments = diff_words(&old, &new);
            prop_assert_eq!(text(&old_segments(&segments)), old);
            prop_assert_eq!(text(&new_segments(&segments)), new);
        }

        /// Equal inputs never produce highlights
        #[test]
        fn identical_lines_are_unchanged(line in arb_line()) {
            let segments = diff_words(&line, &line);
            prop_assert_eq!(segments.len(), 1);
            prop_assert_eq!(segments[0].kind, SegmentKind::Unchanged);
        }

        /// Same input, same output
        #[test]
        fn deterministic(old in arb_line(), new in arb_line()) {
            prop_assert_eq!(diff_words(&old, &new), diff_words(&old, &new));
        }
    }
}
