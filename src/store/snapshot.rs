//! Immutable (version, tree) pairs shared between readers.

use std::sync::Arc;

use crate::store::Version;
use crate::tree::codec::encode_snapshot;
use crate::tree::{ConfigTree, TreeResult};

/// A tree at a given version, with its wire encoding cached.
///
/// Snapshots are swapped as a whole, never mutated, so a reader holding an
/// `Arc<Snapshot>` keeps a consistent view while newer ones are installed.
#[derive(Debug)]
pub struct Snapshot {
    pub version: Version,
    pub tree: Arc<ConfigTree>,
    pub compressed: Arc<[u8]>,
}

impl Snapshot {
    pub fn new(version: Version, tree: ConfigTree) -> TreeResult<Self> {
        let compressed = encode_snapshot(&tree)?;
        Ok(Self {
            version,
            tree: Arc::new(tree),
            compressed: compressed.into(),
        })
    }

    /// Build from an already encoded payload without re-encoding it.
    pub fn from_parts(version: Version, tree: ConfigTree, compressed: Arc<[u8]>) -> Self {
        Self {
            version,
            tree: Arc::new(tree),
            compressed,
        }
    }

    /// Empty tree at the zero version.
    pub fn empty() -> Self {
        let tree = ConfigTree::new();
        let compressed = encode_snapshot(&tree).unwrap_or_default();
        Self::from_parts(Version::zero(), tree, compressed.into())
    }

    /// The data a caller at `client_version` still needs.
    pub fn reply_for(&self, client_version: Option<&Version>) -> SnapshotReply {
        let data = match client_version {
            Some(v) if *v >= self.version => None,
            _ => Some(self.compressed.clone()),
        };
        SnapshotReply {
            version: self.version.clone(),
            data,
        }
    }
}

/// Answer to a snapshot request: always the version, data only when needed.
#[derive(Debug, Clone)]
pub struct SnapshotReply {
    pub version: Version,
    pub data: Option<Arc<[u8]>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_skips_data_for_current_clients() {
        let snap = Snapshot::new(Version::from("v2"), ConfigTree::new()).unwrap();

        assert!(snap.reply_for(None).data.is_some());
        assert!(snap.reply_for(Some(&Version::from("v1"))).data.is_some());
        assert!(snap.reply_for(Some(&Version::from("v2"))).data.is_none());
        assert!(snap.reply_for(Some(&Version::from("v3"))).data.is_none());
    }
}
