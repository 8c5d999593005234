//! Bounded commit history.
//!
//! Entries are appended at the tail and dropped from the head once
//! `max_len` is exceeded. Dropping is silent: operators size the history,
//! it is not an error to outgrow it.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{StoreError, StoreResult, Version};

/// A past snapshot kept for audit and rollback.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub version: Version,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub snapshot: Arc<[u8]>,
}

impl HistoryEntry {
    pub fn record(&self) -> HistoryRecord {
        HistoryRecord {
            version: self.version.clone(),
            author: self.author.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Public view of a history entry, without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub version: Version,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    version: Version,
    author: String,
    timestamp: DateTime<Utc>,
    data: String,
}

/// Ordered, capacity-bounded list of commits, oldest first.
#[derive(Debug)]
pub struct CommitHistory {
    entries: VecDeque<HistoryEntry>,
    max_len: usize,
}

impl CommitHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_len: max_len.max(1),
        }
    }

    /// Append an entry, returning how many old entries were discarded.
    pub fn push(&mut self, entry: HistoryEntry) -> usize {
        self.entries.push_back(entry);
        let mut dropped = 0;
        while self.entries.len() > self.max_len {
            self.entries.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Up to `limit` records, newest first.
    pub fn newest(&self, limit: usize) -> Vec<HistoryRecord> {
        self.entries
            .iter()
            .rev()
            .take(limit)
            .map(HistoryEntry::record)
            .collect()
    }

    pub fn find(&self, version: &Version) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.version == *version)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Write the history as JSON, via a temporary file and rename.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let persisted: Vec<PersistedEntry> = self
            .entries
            .iter()
            .map(|e| PersistedEntry {
                version: e.version.clone(),
                author: e.author.clone(),
                timestamp: e.timestamp,
                data: BASE64.encode(&e.snapshot),
            })
            .collect();

        let json = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)
    }

    /// Load a history file, keeping at most `max_len` newest entries.
    pub fn load(path: &Path, max_len: usize) -> StoreResult<Self> {
        let raw = fs::read(path).map_err(|e| StoreError::Persist(e.to_string()))?;
        let persisted: Vec<PersistedEntry> =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Persist(e.to_string()))?;

        let mut history = Self::new(max_len);
        for entry in persisted {
            let snapshot = BASE64
                .decode(entry.data.as_bytes())
                .map_err(|e| StoreError::Persist(format!("entry {}: {}", entry.version, e)))?;
            history.push(HistoryEntry {
                version: entry.version,
                author: entry.author,
                timestamp: entry.timestamp,
                snapshot: snapshot.into(),
            });
        }
        Ok(history)
    }
}
