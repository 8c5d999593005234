//! Forced upstream lookup.

use crate::config::validation::is_http_url;
use crate::tree::ConfigTree;

/// Resolves the optional single upstream that overrides the server list.
///
/// Two slots are consulted: an option in the replicated tree (when
/// configured and holding a valid URL) and then the static service setting.
#[derive(Debug, Clone, Default)]
pub struct GatewayResolver {
    configured: Option<String>,
    tree_option: Option<String>,
}

impl GatewayResolver {
    pub fn new(configured: Option<String>, tree_option: Option<String>) -> Self {
        Self {
            configured: configured.filter(|u| !u.trim().is_empty()),
            tree_option,
        }
    }

    /// The gateway to use against `tree`, if any. Absence is the common case.
    pub fn resolve(&self, tree: &ConfigTree) -> Option<String> {
        if let Some(path) = &self.tree_option {
            match tree.get_option(path).map(str::trim) {
                Some(url) if is_http_url(url) => return Some(url.to_string()),
                Some(url) if !url.is_empty() => {
                    tracing::warn!(path = %path, value = %url, "Ignoring invalid gateway option");
                }
                _ => {}
            }
        }
        self.configured.clone()
    }
}
