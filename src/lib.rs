use error_set::error_set;

pub mod diff;
pub mod noise;
pub mod parse;
pub mod tree;
pub mod words;

use diff::{Diff, FileDiff, LineIdAllocator, PatchDirection};
use noise::NoiseFilter;
use parse::Selection;
use tree::DiffFileTree;

pub use diff::format_diff;
pub use noise::FilterError;
pub use parse::ParseError;

error_set! {
    /// Top-level error for git-patchwork operations
    PatchworkError := {
        #[display("No changes found in {file}")]
        NoChanges { file: String },
        #[display("{file} does not appear in the diff")]
        NoFile { file: String },
        #[display("No changed lines of {file} match the given references")]
        NothingSelected { file: String },
        #[display("Failed to read diff from {source_name}: {message}")]
        ReadInput { source_name: String, message: String },
        ParseError(ParseError),
        FilterError(FilterError),
    }
}

/// Main interface over one parsed `git diff` output
#[derive(Debug, Default)]
pub struct Patchwork {
    diff: Diff,
    ids: LineIdAllocator,
}

impl Patchwork {
    /// Parse `git diff` output
    ///
    /// # Examples
    /// ```
    /// # use git_patchwork::Patchwork;
    /// let work = Patchwork::new("diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n-old\n+new\n");
    /// assert_eq!(work.diff().files.len(), 1);
    /// ```
    pub fn new(diff_text: &str) -> Self {
        let ids = LineIdAllocator::new();
        let diff = Diff::parse(diff_text, &ids);
        Self { diff, ids }
    }

    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    /// The allocator that numbered this diff's unnumbered rows
    pub fn ids(&self) -> &LineIdAllocator {
        &self.ids
    }

    /// Changed lines with the numbers used to select them
    pub fn show(&self) -> String {
        format_diff(&self.diff)
    }

    /// Patch for the lines named by a `FILE:REFS` reference
    ///
    /// # Examples
    /// ```
    /// # use git_patchwork::{Patchwork, diff::PatchDirection};
    /// let work = Patchwork::new("diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1,2 +1,2 @@\n-old\n+new\n ctx\n");
    /// let patch = work.stage("a.txt:1", PatchDirection::Stage).unwrap();
    /// assert_eq!(patch, "--- a/a.txt\n+++ b/a.txt\n@@ -1,2 +1,3 @@\n old\n+new\n ctx\n");
    /// ```
    pub fn stage(&self, file_ref: &str, direction: PatchDirection) -> Result<String, PatchworkError> {
        self.stage_many([file_ref], direction)
    }

    /// One patch for several `FILE:REFS` references.
    ///
    /// References naming the same file are merged into a single selection,
    /// so each file appears once in the output.
    pub fn stage_many<'a>(
        &self,
        file_refs: impl IntoIterator<Item = &'a str>,
        direction: PatchDirection,
    ) -> Result<String, PatchworkError> {
        let selections = file_refs
            .into_iter()
            .map(parse::parse_selection)
            .collect::<Result<Vec<_>, _>>()?;

        let mut patch = String::new();
        for selection in parse::merge_by_file(selections) {
            patch.push_str(&self.file_patch(selection, direction)?);
        }
        Ok(patch)
    }

    fn file_patch(&self, selection: Selection, direction: PatchDirection) -> Result<String, PatchworkError> {
        let file = self
            .diff
            .file(&selection.file)
            .ok_or_else(|| PatchworkError::NoFile {
                file: selection.file.clone(),
            })?;

        if file.additions() + file.deletions() == 0 {
            return Err(PatchworkError::NoChanges {
                file: selection.file,
            });
        }

        file.patch(&selection.line_ids(file), direction)
            .ok_or(PatchworkError::NothingSelected {
                file: selection.file,
            })
    }

    /// Files left visible by `filter`, in its sort order
    pub fn files(&self, filter: &NoiseFilter) -> Vec<&FileDiff> {
        filter.apply(&self.diff.files)
    }

    /// Directory tree over the files left visible by `filter`
    pub fn tree(&self, filter: &NoiseFilter) -> DiffFileTree {
        let visible: Vec<FileDiff> = filter
            .filter(&self.diff.files)
            .into_iter()
            .cloned()
            .collect();
        DiffFileTree::build(&visible)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use noise::NoiseFilterConfig;
    use similar_asserts::assert_eq;

    const DIFF: &str = "diff --git a/src/app.rs b/src/app.rs
index 1111111..2222222 100644
--- a/src/app.rs
+++ b/src/app.rs
@@ -1,3 +1,3 @@
 fn main() {
-    run(1);
+    run(2);
 }
diff --git a/Cargo.lock b/Cargo.lock
index 3333333..4444444 100644
--- a/Cargo.lock
+++ b/Cargo.lock
@@ -5 +5 @@
-version = \"1.0.0\"
+version = \"1.0.1\"
diff --git a/old.txt b/new.txt
similarity index 100%
rename from old.txt
rename to new.txt
";

    #[test]
    fn stage_selected_addition() {
        let work = Patchwork::new(DIFF);
        let patch = work.stage("src/app.rs:2", PatchDirection::Stage).unwrap();
        assert_eq!(
            patch,
            "--- a/src/app.rs\n+++ b/src/app.rs\n@@ -1,3 +1,4 @@\n fn main() {\n     run(1);\n+    run(2);\n }\n"
        );
    }

    #[test]
    fn unstage_selected_deletion() {
        let work = Patchwork::new(DIFF);
        let patch = work.stage("src/app.rs:-2", PatchDirection::Unstage).unwrap();
        assert_eq!(
            patch,
            "--- a/src/app.rs\n+++ b/src/app.rs\n@@ -1,4 +1,3 @@\n fn main() {\n-    run(1);\n     run(2);\n }\n"
        );
    }

    #[test]
    fn refs_for_one_file_merge_into_one_patch() {
        let work = Patchwork::new(DIFF);
        let patch = work
            .stage_many(["src/app.rs:-2", "Cargo.lock:-5", "src/app.rs:2"], PatchDirection::Stage)
            .unwrap();

        assert_eq!(patch.matches("--- a/src/app.rs\n").count(), 1);
        assert!(patch.starts_with(
            "--- a/src/app.rs\n+++ b/src/app.rs\n@@ -1,3 +1,3 @@\n fn main() {\n-    run(1);\n+    run(2);\n }\n"
        ));
        assert!(patch.ends_with(
            "--- a/Cargo.lock\n+++ b/Cargo.lock\n@@ -5,1 +4,0 @@\n-version = \"1.0.0\"\n"
        ));
    }

    #[test]
    fn stage_many_reports_first_bad_ref() {
        let work = Patchwork::new(DIFF);
        assert!(matches!(
            work.stage_many(["src/app.rs:2", "src/app.rs:x"], PatchDirection::Stage),
            Err(PatchworkError::ParseError(_))
        ));
    }

    #[test]
    fn stage_errors() {
        let work = Patchwork::new(DIFF);
        assert!(matches!(
            work.stage("missing.rs:1", PatchDirection::Stage),
            Err(PatchworkError::NoFile { .. })
        ));
        assert!(matches!(
            work.stage("new.txt:1", PatchDirection::Stage),
            Err(PatchworkError::NoChanges { .. })
        ));
        assert!(matches!(
            work.stage("src/app.rs:40", PatchDirection::Stage),
            Err(PatchworkError::NothingSelected { .. })
        ));
        assert!(matches!(
            work.stage("src/app.rs", PatchDirection::Stage),
            Err(PatchworkError::ParseError(_))
        ));
    }

    #[test]
    fn filtered_files_and_tree() {
        let work = Patchwork::new(DIFF);
        let filter = NoiseFilter::new(NoiseFilterConfig {
            hide_lockfiles: true,
            ..Default::default()
        })
        .unwrap();

        let paths: Vec<&str> = work.files(&filter).iter().map(|f| f.path()).collect();
        assert_eq!(paths, vec!["new.txt", "src/app.rs"]);

        let tree = work.tree(&filter);
        assert_eq!(tree.root.file_count(), 2);
        assert_eq!(tree.root.total_additions(), 1);
    }

    #[test]
    fn show_lists_changed_lines() {
        let work = Patchwork::new(DIFF);
        let shown = work.show();
        assert!(shown.starts_with("src/app.rs:\n  -2:\t    run(1);\n  +2:\t    run(2);\n"));
    }
}
