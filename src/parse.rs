//! Line selections written as `FILE:REFS`.
//!
//! `REFS` is a comma-separated list where `N` or `N..M` names lines on the
//! new side (additions) and `-N` or `-N..-M` names lines on the old side
//! (deletions). Both ends of a range are inclusive.
//!
//! ```
//! use git_patchwork::parse::{LineRef, Side, parse_selection};
//!
//! let selection = parse_selection("gtk.nix:-10..-11,12").unwrap();
//! assert_eq!(selection.file, "gtk.nix");
//! assert_eq!(
//!     selection.refs,
//!     vec![LineRef::range(Side::Old, 10, 11), LineRef::line(Side::New, 12)]
//! );
//! ```

use crate::diff::{DiffLine, FileDiff, LineId, LineType};
use error_set::error_set;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, u32 as number},
    combinator::{all_consuming, opt},
    sequence::preceded,
};
use std::collections::HashSet;
use std::fmt;
use tracing::trace;

error_set! {
    /// Errors from parsing `FILE:REFS` selections
    ParseError := {
        /// No `:` between file and references
        #[display("Invalid selection '{input}': expected 'file:refs'")]
        MissingSeparator { input: String },
        #[display("Invalid selection '{input}': file name cannot be empty")]
        EmptyFileName { input: String },
        #[display("Invalid selection '{input}': no line references")]
        EmptyRefs { input: String },
        /// A reference that is not `N`, `N..M`, `-N` or `-N..-M`
        #[display("Invalid line reference '{value}'")]
        InvalidRef { value: String },
        #[display("Invalid line reference '{value}': lines are numbered from 1")]
        ZeroLine { value: String },
        #[display("Invalid line reference '{value}': {first} is after {last}")]
        InvalidRange { value: String, first: u32, last: u32 },
    }
}

/// Which side of the diff a line number counts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Pre-image numbering; selects deletions
    Old,
    /// Post-image numbering; selects additions
    New,
}

/// An inclusive run of line numbers on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRef {
    pub side: Side,
    pub first: u32,
    pub last: u32,
}

impl LineRef {
    pub fn line(side: Side, number: u32) -> Self {
        Self::range(side, number, number)
    }

    pub fn range(side: Side, first: u32, last: u32) -> Self {
        Self { side, first, last }
    }

    /// Whether this names `line`: additions by new number, deletions by old
    pub fn matches(&self, line: &DiffLine) -> bool {
        let number = match (self.side, line.line_type) {
            (Side::New, LineType::Addition) => line.new_line,
            (Side::Old, LineType::Deletion) => line.old_line,
            _ => None,
        };
        number.is_some_and(|n| (self.first..=self.last).contains(&n))
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.side {
            Side::Old => "-",
            Side::New => "",
        };
        write!(f, "{sign}{}", self.first)?;
        if self.last != self.first {
            write!(f, "..{sign}{}", self.last)?;
        }
        Ok(())
    }
}

/// The lines picked out of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub file: String,
    pub refs: Vec<LineRef>,
}

impl Selection {
    /// Whether any reference names this line. Context and header rows never match.
    pub fn selects(&self, line: &DiffLine) -> bool {
        self.refs.iter().any(|r| r.matches(line))
    }

    /// Ids of every changed line in `file` named by this selection
    pub fn line_ids(&self, file: &FileDiff) -> HashSet<LineId> {
        let ids: HashSet<LineId> = file
            .hunks()
            .iter()
            .flat_map(|hunk| hunk.lines())
            .filter(|line| self.selects(line))
            .map(DiffLine::id)
            .collect();
        trace!(file = %self.file, selected = ids.len(), "resolved line references");
        ids
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.file)?;
        for (i, r) in self.refs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{r}")?;
        }
        Ok(())
    }
}

/// Parse one `FILE:REFS` argument.
///
/// The file is everything before the last `:`, so paths may contain colons.
pub fn parse_selection(input: &str) -> Result<Selection, ParseError> {
    let (file, refs) = input
        .rsplit_once(':')
        .ok_or_else(|| ParseError::MissingSeparator {
            input: input.to_string(),
        })?;

    let file = file.trim();
    if file.is_empty() {
        return Err(ParseError::EmptyFileName {
            input: input.to_string(),
        });
    }

    let refs = refs
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_ref)
        .collect::<Result<Vec<_>, _>>()?;
    if refs.is_empty() {
        return Err(ParseError::EmptyRefs {
            input: input.to_string(),
        });
    }

    Ok(Selection {
        file: file.to_string(),
        refs,
    })
}

/// Combine selections naming the same file, keeping first-seen file order
pub fn merge_by_file(selections: impl IntoIterator<Item = Selection>) -> Vec<Selection> {
    let mut merged: Vec<Selection> = Vec::new();
    for selection in selections {
        match merged.iter_mut().find(|s| s.file == selection.file) {
            Some(existing) => existing.refs.extend(selection.refs),
            None => merged.push(selection),
        }
    }
    merged
}

fn parse_ref(value: &str) -> Result<LineRef, ParseError> {
    let (_, line_ref) = all_consuming(line_ref)
        .parse(value)
        .map_err(|_| ParseError::InvalidRef {
            value: value.to_string(),
        })?;

    if line_ref.first == 0 || line_ref.last == 0 {
        return Err(ParseError::ZeroLine {
            value: value.to_string(),
        });
    }
    if line_ref.first > line_ref.last {
        return Err(ParseError::InvalidRange {
            value: value.to_string(),
            first: line_ref.first,
            last: line_ref.last,
        });
    }
    Ok(line_ref)
}

fn line_ref(input: &str) -> IResult<&str, LineRef> {
    alt((
        (char('-'), number, opt(preceded(tag("..-"), number))).map(
            |(_, first, last): (char, u32, Option<u32>)| {
                LineRef::range(Side::Old, first, last.unwrap_or(first))
            },
        ),
        (number, opt(preceded(tag(".."), number))).map(|(first, last): (u32, Option<u32>)| {
            LineRef::range(Side::New, first, last.unwrap_or(first))
        }),
    ))
    .parse(input)
}
