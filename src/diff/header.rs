//! Hunk header parsing and formatting.
//!
//! A hunk header has the shape
//! `@@ -<old_start>[,<old_count>] +<new_start>[,<new_count>] @@[ <text>]`.
//! Omitted counts default to 1, following the unified-diff shorthand for
//! single-line ranges.

use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, u32 as number},
    combinator::{opt, rest},
    sequence::preceded,
};
use std::fmt;

/// The numeric ranges and trailing text of a `@@ ... @@` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// Trailing context after the closing `@@`, trimmed (often a function name)
    pub header: String,
}

/// Parse a hunk header line.
///
/// Returns `None` for anything that is not a well-formed header, including
/// numbers that overflow `u32`.
///
/// ```
/// use git_patchwork::diff::parse_hunk_header;
///
/// let h = parse_hunk_header("@@ -10,2 +10 @@ fn main()").unwrap();
/// assert_eq!((h.old_start, h.old_count, h.new_start, h.new_count), (10, 2, 10, 1));
/// assert_eq!(h.header, "fn main()");
/// ```
#[must_use]
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    hunk_header(line).ok().map(|(_, header)| header)
}

fn range(input: &str) -> IResult<&str, (u32, u32)> {
    (number, opt(preceded(char(','), number)))
        .map(|(start, count)| (start, count.unwrap_or(1)))
        .parse(input)
}

fn hunk_header(input: &str) -> IResult<&str, HunkHeader> {
    (tag("@@ -"), range, tag(" +"), range, tag(" @@"), rest)
        .map(
            |(_, (old_start, old_count), _, (new_start, new_count), _, trailing): (
                &str,
                (u32, u32),
                &str,
                (u32, u32),
                &str,
                &str,
            )| HunkHeader {
                old_start,
                old_count,
                new_start,
                new_count,
                header: trailing.trim().to_string(),
            },
        )
        .parse(input)
}

impl fmt::Display for HunkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )?;
        if !self.header.is_empty() {
            write!(f, " {}", self.header)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn header(os: u32, oc: u32, ns: u32, nc: u32, text: &str) -> HunkHeader {
        HunkHeader {
            old_start: os,
            old_count: oc,
            new_start: ns,
            new_count: nc,
            header: text.to_string(),
        }
    }

    #[test]
    fn parse_full_ranges() {
        assert_eq!(
            parse_hunk_header("@@ -10,2 +10,3 @@").unwrap(),
            header(10, 2, 10, 3, "")
        );
    }

    #[test]
    fn parse_omitted_counts_default_to_one() {
        assert_eq!(
            parse_hunk_header("@@ -15 +14,0 @@").unwrap(),
            header(15, 1, 14, 0, "")
        );
        assert_eq!(
            parse_hunk_header("@@ -136,0 +137 @@").unwrap(),
            header(136, 0, 137, 1, "")
        );
    }

    #[test]
    fn parse_trailing_text_is_trimmed() {
        assert_eq!(
            parse_hunk_header("@@ -38,0 +39,5 @@   impl Foo {  ").unwrap(),
            header(38, 0, 39, 5, "impl Foo {")
        );
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for line in [
            "",
            "@@",
            "@@ -1 @@",
            "@@ +1 -1 @@",
            "@@ -a,1 +1 @@",
            "@@ -1,1 +1,1",
            "@@@ -1,1 -1,1 +1,1 @@@",
            "-- a/file",
            "@@ -99999999999 +1 @@",
        ] {
            assert!(parse_hunk_header(line).is_none(), "accepted {line:?}");
        }
    }

    #[test]
    fn display_uses_explicit_counts() {
        assert_eq!(header(1, 1, 1, 0, "").to_string(), "@@ -1,1 +1,0 @@");
        assert_eq!(
            header(3, 4, 5, 6, "fn main()").to_string(),
            "@@ -3,4 +5,6 @@ fn main()"
        );
    }
}
