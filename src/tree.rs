//! Directory tree over a flat list of changed files.
//!
//! The tree is a plain value rebuilt from scratch whenever its input
//! changes. Aggregate statistics are computed on demand by walking it.

use crate::diff::FileDiff;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// A directory or file in the tree; a node is a directory iff it holds no diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub name: String,
    /// Slash-joined path from the root
    pub path: String,
    pub children: Vec<Node>,
    pub file_diff: Option<FileDiff>,
}

impl Node {
    fn directory(name: &str, path: &str) -> Self {
        Self {
            id: format!("dir:{path}"),
            name: name.to_string(),
            path: path.to_string(),
            children: Vec::new(),
            file_diff: None,
        }
    }

    fn file(name: &str, path: &str, file_diff: &FileDiff) -> Self {
        Self {
            id: format!("file:{path}"),
            name: name.to_string(),
            path: path.to_string(),
            children: Vec::new(),
            file_diff: Some(file_diff.clone()),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.file_diff.is_none()
    }

    /// Files at or below this node
    pub fn file_count(&self) -> usize {
        match self.file_diff {
            Some(_) => 1,
            None => self.children.iter().map(Node::file_count).sum(),
        }
    }

    pub fn total_additions(&self) -> usize {
        match &self.file_diff {
            Some(diff) => diff.additions(),
            None => self.children.iter().map(Node::total_additions).sum(),
        }
    }

    pub fn total_deletions(&self) -> usize {
        match &self.file_diff {
            Some(diff) => diff.deletions(),
            None => self.children.iter().map(Node::total_deletions).sum(),
        }
    }

    /// Insert `child` at its sorted position, after any equal siblings
    fn insert_child(&mut self, child: Node) -> usize {
        let idx = self
            .children
            .partition_point(|existing| compare(existing, &child) != Ordering::Greater);
        self.children.insert(idx, child);
        idx
    }
}

/// Directories first, then case-insensitive name, then exact name
fn compare(a: &Node, b: &Node) -> Ordering {
    b.is_directory()
        .cmp(&a.is_directory())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// One visible row of a flattened tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub node: &'a Node,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFileTree {
    /// Unnamed directory holding the top-level entries
    pub root: Node,
}

impl DiffFileTree {
    /// Build the tree for `files`, keeping every directory's children sorted
    pub fn build(files: &[FileDiff]) -> Self {
        let mut root = Node::directory("", "");
        for file in files {
            insert(&mut root, file);
        }
        Self { root }
    }

    /// Paths of directories small enough to start expanded: those with at
    /// most `threshold` files beneath them.
    pub fn expanded_by_default(&self, threshold: usize) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        collect_small_directories(&self.root.children, threshold, &mut paths);
        paths
    }

    /// Visible rows in display order, descending only into directories whose
    /// path is in `expanded`
    pub fn flatten(&self, expanded: &BTreeSet<String>) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        flatten_into(&self.root.children, 0, expanded, &mut rows);
        rows
    }
}

fn insert(root: &mut Node, file: &FileDiff) {
    let components: Vec<&str> = file.path().split('/').filter(|c| !c.is_empty()).collect();
    let Some((name, dirs)) = components.split_last() else {
        debug!(path = file.path(), "skipping file with empty path");
        return;
    };

    let mut node = root;
    let mut prefix = String::new();
    for dir in dirs {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(dir);

        let idx = match node
            .children
            .iter()
            .position(|child| child.is_directory() && child.name == *dir)
        {
            Some(idx) => idx,
            None => node.insert_child(Node::directory(dir, &prefix)),
        };
        node = &mut node.children[idx];
    }

    node.insert_child(Node::file(name, &components.join("/"), file));
}

fn collect_small_directories(nodes: &[Node], threshold: usize, paths: &mut BTreeSet<String>) {
    for node in nodes.iter().filter(|n| n.is_directory()) {
        if node.file_count() <= threshold {
            paths.insert(node.path.clone());
        }
        collect_small_directories(&node.children, threshold, paths);
    }
}

fn flatten_into<'a>(
    nodes: &'a [Node],
    depth: usize,
    expanded: &BTreeSet<String>,
    rows: &mut Vec<TreeRow<'a>>,
) {
    for node in nodes {
        let is_open = node.is_directory() && expanded.contains(&node.path);
        rows.push(TreeRow {
            depth,
            node,
            expanded: is_open,
        });
        if is_open {
            flatten_into(&node.children, depth + 1, expanded, rows);
        }
    }
}

/// Fully expanded listing with per-node statistics
impl fmt::Display for DiffFileTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[Node], depth: usize) -> fmt::Result {
            for node in nodes {
                let indent = "  ".repeat(depth);
                if node.is_directory() {
                    writeln!(
                        f,
                        "{indent}{}/ ({} files, +{} -{})",
                        node.name,
                        node.file_count(),
                        node.total_additions(),
                        node.total_deletions()
                    )?;
                    write_nodes(f, &node.children, depth + 1)?;
                } else {
                    writeln!(
                        f,
                        "{indent}{} +{} -{}",
                        node.name,
                        node.total_additions(),
                        node.total_deletions()
                    )?;
                }
            }
            Ok(())
        }
        write_nodes(f, &self.root.children, 0)
    }
}
