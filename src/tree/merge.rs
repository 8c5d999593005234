//! Overlay merge.
//!
//! Sections are unioned recursively and overlay option values win. A name
//! that is a section on one side and an option on the other is rejected with
//! [`TreeError::TypeConflict`] instead of letting either kind silently win.

use crate::tree::node::{child_path, ConfigTree, Node, Section};
use crate::tree::{TreeError, TreeResult};

impl ConfigTree {
    /// Merge `overlay` over `self`, returning the combined tree.
    ///
    /// `self` is left untouched on error.
    pub fn merge(&self, overlay: &ConfigTree) -> TreeResult<ConfigTree> {
        let mut root = self.root().clone();
        merge_into(&mut root, overlay.root(), "/")?;
        Ok(ConfigTree::from_root(root))
    }
}

/// Merge `overlay` into `base` in place. `path` names `base` in errors.
pub(crate) fn merge_into(base: &mut Section, overlay: &Section, path: &str) -> TreeResult<()> {
    for (name, node) in overlay.iter() {
        if base.get(name).is_none() {
            base.insert(name, node.clone());
            continue;
        }
        let here = child_path(path, name);
        match (base.get_mut(name), node) {
            (Some(Node::Section(existing)), Node::Section(incoming)) => {
                merge_into(existing, incoming, &here)?
            }
            (Some(Node::Option(existing)), Node::Option(incoming)) => {
                *existing = incoming.clone();
            }
            _ => return Err(TreeError::TypeConflict { path: here }),
        }
    }
    Ok(())
}
