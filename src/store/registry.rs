//! Registry of replicas that announced themselves.
//!
//! Best effort and non-authoritative: entries exist for operators to see the
//! propagation tree. Nothing in replication reads them. Replicas that stop
//! announcing themselves are dropped once their grace time has passed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::observability::metrics;
use crate::store::Version;

/// Last announcement received from a replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaveRecord {
    pub url: String,
    pub version: Option<Version>,
    pub last_seen: DateTime<Utc>,
}

/// Grace time used by [`SlaveRegistry::new`].
pub const DEFAULT_SLAVES_GRACE: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub struct SlaveRegistry {
    slaves: DashMap<String, SlaveRecord>,
    grace: Duration,
}

impl Default for SlaveRegistry {
    fn default() -> Self {
        Self::with_grace_time(DEFAULT_SLAVES_GRACE)
    }
}

impl SlaveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grace_time(grace: Duration) -> Self {
        Self {
            slaves: DashMap::new(),
            grace,
        }
    }

    /// Record an announcement. Never fails; bad input is logged and dropped.
    pub fn register(&self, url: &str, version: Option<Version>) {
        let url = match Url::parse(url.trim()) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => u.to_string(),
            Ok(u) => {
                tracing::warn!(url = %u, "Ignoring slave announcement with unsupported scheme");
                return;
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Ignoring slave announcement with invalid URL");
                return;
            }
        };

        self.prune();
        let is_new = !self.slaves.contains_key(&url);
        self.slaves.insert(
            url.clone(),
            SlaveRecord {
                url: url.clone(),
                version,
                last_seen: Utc::now(),
            },
        );

        if is_new {
            tracing::info!(url = %url, "Slave registered");
        } else {
            tracing::debug!(url = %url, "Slave refreshed registration");
        }
        metrics::record_registered_slaves(self.slaves.len());
    }

    /// Slaves seen within the grace time, sorted by URL.
    pub fn list(&self) -> Vec<SlaveRecord> {
        if self.prune() > 0 {
            metrics::record_registered_slaves(self.slaves.len());
        }
        let mut records: Vec<SlaveRecord> = self.slaves.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        records
    }

    pub fn len(&self) -> usize {
        self.slaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slaves.is_empty()
    }

    /// Drop entries not seen within the grace time. Returns how many went.
    fn prune(&self) -> usize {
        let now = Utc::now();
        let before = self.slaves.len();
        self.slaves.retain(|url, record| {
            // A last_seen in the future (clock step) counts as fresh.
            let expired = (now - record.last_seen)
                .to_std()
                .is_ok_and(|age| age > self.grace);
            if expired {
                tracing::info!(url = %url, last_seen = %record.last_seen, "Slave expired");
            }
            !expired
        });
        before.saturating_sub(self.slaves.len())
    }
}
