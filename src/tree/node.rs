//! Tree model and path traversal.
//!
//! Paths are slash separated (`/Resources/Sites/CERN`). The empty path and
//! `/` both denote the root section.

use crate::tree::{TreeError, TreeResult};

/// A child of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Section(Section),
    Option(String),
}

impl Node {
    pub fn is_section(&self) -> bool {
        matches!(self, Node::Section(_))
    }

    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Node::Section(s) => Some(s),
            Node::Option(_) => None,
        }
    }

    pub fn as_option(&self) -> Option<&str> {
        match self {
            Node::Option(v) => Some(v),
            Node::Section(_) => None,
        }
    }
}

/// An ordered mapping from name to child node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    entries: Vec<(String, Node)>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    /// Insert or replace a child. A replaced child keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, node: Node) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = node,
            None => self.entries.push((name, node)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(n, node)| (n.as_str(), node))
    }

    /// Option children, in insertion order.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter_map(|(n, node)| node.as_option().map(|v| (n, v)))
    }

    /// Section children, in insertion order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.iter()
            .filter_map(|(n, node)| node.as_section().map(|s| (n, s)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The hierarchical configuration namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    root: Section,
}

impl ConfigTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_root(root: Section) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Section {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Look up the node at `path` without creating anything.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let segments = split_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut section = &self.root;
        for segment in parents {
            section = section.get(segment)?.as_section()?;
        }
        section.get(last)
    }

    pub fn get_section(&self, path: &str) -> Option<&Section> {
        let segments = split_path(path).ok()?;
        let mut section = &self.root;
        for segment in &segments {
            section = section.get(segment)?.as_section()?;
        }
        Some(section)
    }

    pub fn get_option(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_option()
    }

    /// Set an option, creating intermediate sections.
    ///
    /// Values are stored trimmed and must fit on one line.
    pub fn set_option(&mut self, path: &str, value: &str) -> TreeResult<()> {
        if value.contains('\n') || value.contains('\r') {
            return Err(TreeError::InvalidValue {
                path: path.to_string(),
                reason: "values must be single-line".to_string(),
            });
        }
        let segments = split_path(path)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| TreeError::InvalidPath(path.to_string()))?;
        let section = self.section_mut_creating(parents)?;
        if let Some(Node::Section(_)) = section.get(last) {
            return Err(TreeError::TypeConflict {
                path: join_path(&segments),
            });
        }
        section.insert(last.clone(), Node::Option(value.trim().to_string()));
        Ok(())
    }

    /// Create the section at `path` (and its parents) if missing.
    pub fn create_section(&mut self, path: &str) -> TreeResult<()> {
        let segments = split_path(path)?;
        self.section_mut_creating(&segments)?;
        Ok(())
    }

    /// Delete the node at `path`. Returns whether something was removed.
    pub fn delete(&mut self, path: &str) -> bool {
        let Ok(segments) = split_path(path) else {
            return false;
        };
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };
        let mut section = &mut self.root;
        for segment in parents {
            match section.get_mut(segment) {
                Some(Node::Section(s)) => section = s,
                _ => return false,
            }
        }
        section.remove(last).is_some()
    }

    /// Names of the options directly under `path`.
    pub fn list_options(&self, path: &str) -> Vec<String> {
        self.get_section(path)
            .map(|s| s.options().map(|(n, _)| n.to_string()).collect())
            .unwrap_or_default()
    }

    /// Names of the sections directly under `path`.
    pub fn list_sections(&self, path: &str) -> Vec<String> {
        self.get_section(path)
            .map(|s| s.sections().map(|(n, _)| n.to_string()).collect())
            .unwrap_or_default()
    }

    fn section_mut_creating(&mut self, segments: &[String]) -> TreeResult<&mut Section> {
        let mut section = &mut self.root;
        for (depth, segment) in segments.iter().enumerate() {
            if section.get(segment).is_none() {
                section.insert(segment.clone(), Node::Section(Section::new()));
            }
            section = match section.get_mut(segment) {
                Some(Node::Section(s)) => s,
                _ => {
                    return Err(TreeError::TypeConflict {
                        path: join_path(&segments[..=depth]),
                    })
                }
            };
        }
        Ok(section)
    }
}

/// Split a slash separated path into validated segments.
pub fn split_path(path: &str) -> TreeResult<Vec<String>> {
    let mut segments = Vec::new();
    for raw in path.split('/') {
        let segment = raw.trim();
        if segment.is_empty() {
            continue;
        }
        if !is_valid_name(segment) {
            return Err(TreeError::InvalidPath(path.to_string()));
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

pub fn join_path(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

/// Child path of `parent`, which is already in `/a/b` form (or `/`).
pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" || parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.trim() == name
        && !name.contains(|c| matches!(c, '/' | '=' | '{' | '}' | '#' | '\n' | '\r'))
}
