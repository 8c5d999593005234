//! Typed reads over string leaves.
//!
//! The tree only stores strings. Consumers that want numbers, flags or lists
//! go through these helpers.

use std::str::FromStr;

use crate::tree::node::ConfigTree;

impl ConfigTree {
    /// Parse the option at `path` with `FromStr`. Missing or unparsable is `None`.
    pub fn get_as<T: FromStr>(&self, path: &str) -> Option<T> {
        self.get_option(path)?.trim().parse().ok()
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        parse_bool(self.get_option(path)?)
    }

    /// Comma separated list; missing option is an empty list.
    pub fn get_list(&self, path: &str) -> Vec<String> {
        self.get_option(path).map(split_list).unwrap_or_default()
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "y" | "1" | "on" => Some(true),
        "no" | "false" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
