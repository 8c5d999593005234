//! The authoritative versioned tree.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::observability::metrics;
use crate::security::Identity;
use crate::store::history::{CommitHistory, HistoryEntry, HistoryRecord};
use crate::store::snapshot::{Snapshot, SnapshotReply};
use crate::store::{StoreError, StoreResult, Version};
use crate::tree::codec::decode_snapshot;
use crate::tree::{ChangeSet, ConfigTree};

/// Hard cap on history listings, whatever the caller asks for.
pub const MAX_HISTORY_LISTING: usize = 100;

const BOOTSTRAP_AUTHOR: &str = "bootstrap";

/// How a committed tree combines with the current one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// The committed tree becomes the whole tree.
    #[default]
    Replace,
    /// The committed tree is merged over the current one.
    Merge,
}

/// Store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub history_max_length: usize,
    pub history_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_max_length: 100,
            history_path: None,
        }
    }
}

/// Master-side owner of the configuration tree.
pub struct VersionedStore {
    current: ArcSwap<Snapshot>,
    /// Held for the whole commit; serializes writers.
    history: Mutex<CommitHistory>,
    config: StoreConfig,
}

impl VersionedStore {
    /// Create a store whose first version holds `initial`.
    pub fn new(config: StoreConfig, initial: ConfigTree) -> StoreResult<Self> {
        let version = Version::next_after(None);
        let snapshot = Snapshot::new(version.clone(), initial)?;

        let mut history = CommitHistory::new(config.history_max_length);
        history.push(HistoryEntry {
            version: version.clone(),
            author: BOOTSTRAP_AUTHOR.to_string(),
            timestamp: Utc::now(),
            snapshot: snapshot.compressed.clone(),
        });

        let store = Self {
            current: ArcSwap::from_pointee(snapshot),
            history: Mutex::new(history),
            config,
        };
        store.persist();

        tracing::info!(version = %version, "Configuration store initialized");
        Ok(store)
    }

    /// Resume from the persisted history when present, else start from `seed`.
    pub fn open(config: StoreConfig, seed: ConfigTree) -> StoreResult<Self> {
        let Some(path) = config.history_path.clone().filter(|p| p.exists()) else {
            return Self::new(config, seed);
        };

        let history = CommitHistory::load(&path, config.history_max_length)?;
        let Some(latest) = history.latest() else {
            return Self::new(config, seed);
        };

        let tree = decode_snapshot(&latest.snapshot)?;
        let snapshot = Snapshot::from_parts(latest.version.clone(), tree, latest.snapshot.clone());
        tracing::info!(
            path = ?path,
            version = %snapshot.version,
            entries = history.len(),
            "Configuration store resumed from history"
        );
        metrics::record_history_length(history.len());

        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            history: Mutex::new(history),
            config,
        })
    }

    /// Current version stamp.
    pub fn version(&self) -> Version {
        self.current.load().version.clone()
    }

    /// Current snapshot; stays valid even after later commits.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Current compressed snapshot.
    pub fn compressed_snapshot(&self) -> SnapshotReply {
        self.current.load().reply_for(None)
    }

    /// Version, plus the snapshot only if `client_version` is behind.
    pub fn compressed_snapshot_if_newer(&self, client_version: &Version) -> SnapshotReply {
        self.current.load().reply_for(Some(client_version))
    }

    /// Commit an encoded tree on behalf of `identity`.
    pub fn commit(&self, payload: &[u8], mode: CommitMode, identity: &Identity) -> StoreResult<Version> {
        let author = authorize(identity)?;
        let tree = decode_snapshot(payload)?;
        self.install(tree, mode, &author)
    }

    /// Commit an in-memory tree on behalf of `identity`.
    pub fn commit_tree(&self, tree: ConfigTree, mode: CommitMode, identity: &Identity) -> StoreResult<Version> {
        let author = authorize(identity)?;
        self.install(tree, mode, &author)
    }

    /// Re-commit the content of `version` as a new, newer version.
    pub fn rollback(&self, version: &Version, identity: &Identity) -> StoreResult<Version> {
        let author = authorize(identity)?;
        let payload = self.historical_snapshot(version)?;
        let tree = decode_snapshot(&payload)?;

        let new_version = self.install(tree, CommitMode::Replace, &author)?;
        tracing::info!(
            target_version = %version,
            new_version = %new_version,
            author = %author,
            "Rolled back configuration"
        );
        Ok(new_version)
    }

    /// Up to `limit` (capped at 100) history records, newest first.
    pub fn commit_history(&self, limit: usize) -> Vec<HistoryRecord> {
        self.lock_history().newest(limit.min(MAX_HISTORY_LISTING))
    }

    /// Compressed snapshot recorded for `version`.
    pub fn historical_snapshot(&self, version: &Version) -> StoreResult<Arc<[u8]>> {
        self.lock_history()
            .find(version)
            .map(|e| e.snapshot.clone())
            .ok_or_else(|| StoreError::NotFound(version.clone()))
    }

    /// Structural diff between two retained versions.
    pub fn diff_versions(&self, from: &Version, to: &Version) -> StoreResult<ChangeSet> {
        let old = decode_snapshot(&self.historical_snapshot(from)?)?;
        let new = decode_snapshot(&self.historical_snapshot(to)?)?;
        Ok(old.diff(&new))
    }

    pub fn history_len(&self) -> usize {
        self.lock_history().len()
    }

    fn install(&self, tree: ConfigTree, mode: CommitMode, author: &str) -> StoreResult<Version> {
        let mut history = self.lock_history();
        let current = self.current.load_full();

        let snapshot = match next_snapshot(&current, tree, mode) {
            Ok(s) => s,
            Err(e) => {
                metrics::record_commit("rejected");
                tracing::warn!(author = %author, error = %e, "Commit rejected");
                return Err(e);
            }
        };
        let version = snapshot.version.clone();

        let dropped = history.push(HistoryEntry {
            version: version.clone(),
            author: author.to_string(),
            timestamp: Utc::now(),
            snapshot: snapshot.compressed.clone(),
        });
        self.current.store(Arc::new(snapshot));

        if dropped > 0 {
            tracing::debug!(dropped, "Commit history at capacity, oldest entries discarded");
        }
        self.save_history(&history);

        metrics::record_commit("accepted");
        metrics::record_history_length(history.len());
        tracing::info!(
            version = %version,
            previous = %current.version,
            author = %author,
            mode = ?mode,
            "Configuration committed"
        );
        Ok(version)
    }

    fn persist(&self) {
        let history = self.lock_history();
        self.save_history(&history);
    }

    fn save_history(&self, history: &CommitHistory) {
        if let Some(path) = &self.config.history_path {
            if let Err(e) = history.save(path) {
                tracing::error!(path = ?path, error = %e, "Failed to persist commit history");
            }
        }
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, CommitHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn next_snapshot(current: &Snapshot, tree: ConfigTree, mode: CommitMode) -> StoreResult<Snapshot> {
    let tree = match mode {
        CommitMode::Replace => tree,
        CommitMode::Merge => current.tree.merge(&tree)?,
    };
    let version = Version::next_after(Some(&current.version));
    Ok(Snapshot::new(version, tree)?)
}

fn authorize(identity: &Identity) -> StoreResult<String> {
    if !identity.is_authenticated() {
        return Err(StoreError::Auth("caller is not authenticated".to_string()));
    }
    if !identity.can_write() {
        return Err(StoreError::Auth(format!(
            "identity '{}' may not modify the configuration",
            identity.name()
        )));
    }
    Ok(identity.name().to_string())
}
