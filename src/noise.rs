//! Hiding and ordering of changed files.
//!
//! Filtering only removes entries and sorting only reorders them, so the
//! two steps can be applied in either order.
//!
//! Settings can come from a TOML file:
//!
//! ```
//! use git_patchwork::noise::{NoiseFilterConfig, SortMode};
//!
//! let config = NoiseFilterConfig::from_toml(r#"
//! hide_lockfiles = true
//! custom_patterns = ["docs/**", "*.snap"]
//! sort = "size"
//! "#).unwrap();
//! assert_eq!(config.sort, SortMode::Size);
//! assert!(!config.hide_generated);
//! ```

use crate::diff::FileDiff;
use crate::diff::file::file_name;
use error_set::error_set;
use regex::Regex;
use serde::Deserialize;
use std::cmp::Ordering;
use std::path::Path;
use tracing::trace;

error_set! {
    /// Errors from loading or compiling noise filter settings
    FilterError := {
        /// Config file could not be read
        #[display("Failed to read filter config {path}: {message}")]
        ReadConfig { path: String, message: String },
        /// Config file is not valid TOML for [`NoiseFilterConfig`]
        #[display("Invalid filter config: {message}")]
        InvalidConfig { message: String },
        /// A custom pattern did not compile
        #[display("Invalid pattern '{pattern}': {message}")]
        InvalidPattern { pattern: String, message: String },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Case-insensitive path order
    #[default]
    Path,
    /// Grouped by change type, then path
    #[serde(alias = "type")]
    ChangeType,
    /// Largest change (additions + deletions) first, then path
    Size,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseFilterConfig {
    pub hide_generated: bool,
    pub hide_lockfiles: bool,
    /// Glob patterns of files to hide
    pub custom_patterns: Vec<String>,
    pub sort: SortMode,
}

impl NoiseFilterConfig {
    pub fn from_toml(text: &str) -> Result<Self, FilterError> {
        toml::from_str(text).map_err(|e| FilterError::InvalidConfig {
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, FilterError> {
        let text = std::fs::read_to_string(path).map_err(|e| FilterError::ReadConfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text)
    }
}

#[derive(Debug, Clone)]
struct Pattern {
    regex: Regex,
    /// Patterns without a slash match the file name only
    name_only: bool,
}

impl Pattern {
    fn matches(&self, path: &str) -> bool {
        if self.name_only {
            self.regex.is_match(file_name(path))
        } else {
            self.regex.is_match(path)
        }
    }
}

/// Translate a glob into an anchored regular expression.
///
/// `*` and `?` stay within one path component, `**` crosses components and
/// `**/` also matches no directory at all.
pub fn glob_to_regex(glob: &str) -> String {
    let mut re = String::from("^");
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    re.push('$');
    re
}

#[derive(Debug, Clone)]
pub struct NoiseFilter {
    config: NoiseFilterConfig,
    patterns: Vec<Pattern>,
}

impl NoiseFilter {
    pub fn new(config: NoiseFilterConfig) -> Result<Self, FilterError> {
        let patterns = config
            .custom_patterns
            .iter()
            .map(|glob| {
                Regex::new(&glob_to_regex(glob))
                    .map(|regex| Pattern {
                        regex,
                        name_only: !glob.contains('/'),
                    })
                    .map_err(|e| FilterError::InvalidPattern {
                        pattern: glob.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { config, patterns })
    }

    pub fn config(&self) -> &NoiseFilterConfig {
        &self.config
    }

    /// Whether the rules hide this file
    pub fn is_hidden(&self, file: &FileDiff) -> bool {
        let hidden = (self.config.hide_generated && file.is_generated())
            || (self.config.hide_lockfiles && file.is_lockfile())
            || self.patterns.iter().any(|p| p.matches(file.path()));
        if hidden {
            trace!(path = file.path(), "hiding file");
        }
        hidden
    }

    /// Drop hidden files, keeping the order of the rest
    pub fn filter<'a>(&self, files: impl IntoIterator<Item = &'a FileDiff>) -> Vec<&'a FileDiff> {
        files.into_iter().filter(|f| !self.is_hidden(f)).collect()
    }

    /// Order files by the configured sort mode
    pub fn sort(&self, files: &mut [&FileDiff]) {
        match self.config.sort {
            SortMode::Path => files.sort_by(|a, b| by_path(a, b)),
            SortMode::ChangeType => files.sort_by(|a, b| {
                a.change_type()
                    .cmp(&b.change_type())
                    .then_with(|| by_path(a, b))
            }),
            SortMode::Size => files.sort_by(|a, b| {
                size(b).cmp(&size(a)).then_with(|| by_path(a, b))
            }),
        }
    }

    /// Filter, then sort
    pub fn apply<'a>(&self, files: impl IntoIterator<Item = &'a FileDiff>) -> Vec<&'a FileDiff> {
        let mut visible = self.filter(files);
        self.sort(&mut visible);
        visible
    }
}

fn size(file: &FileDiff) -> usize {
    file.additions() + file.deletions()
}

fn by_path(a: &FileDiff, b: &FileDiff) -> Ordering {
    a.path()
        .to_lowercase()
        .cmp(&b.path().to_lowercase())
        .then_with(|| a.path().cmp(b.path()))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::diff::{ChangeType, FileMeta, LineIdAllocator};
    use proptest::prelude::*;

    fn arb_file() -> impl Strategy<Value = FileDiff> {
        (
            prop::sample::select(vec![
                "src/a.rs", "src/B.rs", "Cargo.lock", "x.min.js", "docs/z.md", "a.snap", "README",
            ]),
            prop::sample::select(vec![
                ChangeType::Added,
                ChangeType::Modified,
                ChangeType::Deleted,
                ChangeType::Renamed,
            ]),
            0..6usize,
        )
            .prop_map(|(path, change_type, additions)| {
                let mut text = format!("@@ -0,0 +1,{additions} @@\n");
                for _ in 0..additions {
                    text.push_str("+x\n");
                }
                FileDiff::parse_with_meta(
                    FileMeta::new(path, change_type),
                    &text,
                    &LineIdAllocator::new(),
                )
            })
    }

    fn arb_config() -> impl Strategy<Value = NoiseFilterConfig> {
        (
            any::<bool>(),
            any::<bool>(),
            prop::sample::subsequence(vec!["*.snap".to_string(), "docs/**".to_string()], 0..=2),
            prop::sample::select(vec![SortMode::Path, SortMode::ChangeType, SortMode::Size]),
        )
            .prop_map(|(hide_generated, hide_lockfiles, custom_patterns, sort)| {
                NoiseFilterConfig {
                    hide_generated,
                    hide_lockfiles,
                    custom_patterns,
                    sort,
                }
            })
    }

    proptest! {
        /// Filtering then sorting gives the same list as sorting then filtering
        #[test]
        fn filter_and_sort_commute(
            files in prop::collection::vec(arb_file(), 0..12),
            config in arb_config(),
        ) {
            let filter = NoiseFilter::new(config).map_err(|e| TestCaseError::fail(e.to_string()))?;

            let filtered_first = filter.apply(&files);

            let mut sorted_first: Vec<&FileDiff> = files.iter().collect();
            filter.sort(&mut sorted_first);
            let sorted_first = filter.filter(sorted_first);

            prop_assert_eq!(filtered_first, sorted_first);
        }

        /// Sorting keeps every entry
        #[test]
        fn sort_never_removes(
            files in prop::collection::vec(arb_file(), 0..12),
            config in arb_config(),
        ) {
            let filter = NoiseFilter::new(config).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let mut all: Vec<&FileDiff> = files.iter().collect();
            filter.sort(&mut all);
            prop_assert_eq!(all.len(), files.len());
        }
    }
}
