//! Structural diff between two trees.
//!
//! Replication always ships full snapshots; a [`ChangeSet`] is used for
//! audit (history diffs) and for logging what a refresh changed.

use serde::{Deserialize, Serialize};

use crate::tree::node::{child_path, ConfigTree, Node, Section};
use crate::tree::TreeResult;

/// A single difference, addressed by absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    SectionAdded { path: String },
    SectionRemoved { path: String },
    OptionAdded { path: String, value: String },
    OptionRemoved { path: String, old: String },
    OptionModified { path: String, old: String, new: String },
}

impl Change {
    pub fn path(&self) -> &str {
        match self {
            Change::SectionAdded { path }
            | Change::SectionRemoved { path }
            | Change::OptionAdded { path, .. }
            | Change::OptionRemoved { path, .. }
            | Change::OptionModified { path, .. } => path,
        }
    }
}

/// Ordered list of changes turning one tree into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Apply the changes to `base`, producing a new tree.
    pub fn apply(&self, base: &ConfigTree) -> TreeResult<ConfigTree> {
        let mut tree = base.clone();
        for change in &self.changes {
            match change {
                Change::SectionAdded { path } => tree.create_section(path)?,
                Change::SectionRemoved { path } | Change::OptionRemoved { path, .. } => {
                    tree.delete(path);
                }
                Change::OptionAdded { path, value } => tree.set_option(path, value)?,
                Change::OptionModified { path, new, .. } => tree.set_option(path, new)?,
            }
        }
        Ok(tree)
    }
}

impl ConfigTree {
    /// Compute the changes that turn `self` into `newer`.
    pub fn diff(&self, newer: &ConfigTree) -> ChangeSet {
        let mut changes = Vec::new();
        diff_sections(self.root(), newer.root(), "/", &mut changes);
        ChangeSet { changes }
    }
}

fn diff_sections(old: &Section, new: &Section, path: &str, out: &mut Vec<Change>) {
    for (name, old_node) in old.iter() {
        let here = child_path(path, name);
        match (old_node, new.get(name)) {
            (Node::Option(a), Some(Node::Option(b))) => {
                if a != b {
                    out.push(Change::OptionModified {
                        path: here,
                        old: a.clone(),
                        new: b.clone(),
                    });
                }
            }
            (Node::Section(a), Some(Node::Section(b))) => diff_sections(a, b, &here, out),
            (old_node, replacement) => {
                out.push(removal(here.clone(), old_node));
                if let Some(node) = replacement {
                    addition(here, node, out);
                }
            }
        }
    }

    for (name, node) in new.iter() {
        if old.get(name).is_none() {
            addition(child_path(path, name), node, out);
        }
    }
}

fn removal(path: String, node: &Node) -> Change {
    match node {
        Node::Option(old) => Change::OptionRemoved {
            path,
            old: old.clone(),
        },
        Node::Section(_) => Change::SectionRemoved { path },
    }
}

fn addition(path: String, node: &Node, out: &mut Vec<Change>) {
    match node {
        Node::Option(value) => out.push(Change::OptionAdded {
            path,
            value: value.clone(),
        }),
        Node::Section(section) => {
            out.push(Change::SectionAdded { path: path.clone() });
            diff_sections(&Section::new(), section, &path, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(text: &str) -> ConfigTree {
        ConfigTree::load(text).unwrap()
    }

    #[test]
    fn test_identical_trees_have_no_changes() {
        let a = tree("A\n{\n  x = 1\n}\n");
        assert!(a.diff(&a.clone()).is_empty());
    }

    #[test]
    fn test_detects_each_kind() {
        let old = tree("A\n{\n  x = 1\n  y = 2\n}\nGone\n{\n  z = 3\n}\n");
        let new = tree("A\n{\n  x = 5\n  w = 9\n}\nNew\n{\n  q = 1\n}\n");

        let diff = old.diff(&new);
        assert_eq!(
            diff.changes,
            vec![
                Change::OptionModified { path: "/A/x".into(), old: "1".into(), new: "5".into() },
                Change::OptionRemoved { path: "/A/y".into(), old: "2".into() },
                Change::OptionAdded { path: "/A/w".into(), value: "9".into() },
                Change::SectionRemoved { path: "/Gone".into() },
                Change::SectionAdded { path: "/New".into() },
                Change::OptionAdded { path: "/New/q".into(), value: "1".into() },
            ]
        );
    }

    #[test]
    fn test_kind_change_is_remove_then_add() {
        let old = tree("A\n{\n  x = 1\n}\n");
        let new = tree("A\n{\n  x\n  {\n    y = 2\n  }\n}\n");

        let diff = old.diff(&new);
        assert_eq!(diff.changes[0], Change::OptionRemoved { path: "/A/x".into(), old: "1".into() });
        assert_eq!(diff.changes[1], Change::SectionAdded { path: "/A/x".into() });

        let patched = diff.apply(&old).unwrap();
        assert_eq!(patched.get_option("/A/x/y"), Some("2"));
    }

    #[test]
    fn test_apply_reproduces_target() {
        let old = tree("A\n{\n  x = 1\n  y = 2\n}\nGone\n{\n  z = 3\n}\n");
        let new = tree("A\n{\n  x = 5\n}\nNew\n{\n  Deep\n  {\n    q = 1\n  }\n}\n");

        let patched = old.diff(&new).apply(&old).unwrap();
        assert_eq!(patched, new);
        assert!(patched.diff(&new).is_empty());
    }
}
