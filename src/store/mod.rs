//! Versioned configuration store (master role).
//!
//! # Data Flow
//! ```text
//! commit(payload, identity)
//!     → security::Identity check (AuthError)
//!     → tree::codec decode (ParseError)
//!     → replace or merge over current tree
//!     → version.rs next stamp
//!     → history.rs append (oldest dropped past capacity)
//!     → atomic swap of Arc<Snapshot>
//!     → optional JSON persistence of history
//!
//! Readers (version, snapshot) only touch the ArcSwap and never wait
//! on the commit mutex.
//! ```
//!
//! # Design Decisions
//! - Rollback is a new commit with old content; versions never rewind
//! - Versions are wall-clock stamps bumped past the previous one, so they
//!   stay monotonic across restarts without a counter file
//! - SlaveRegistry is bookkeeping only, replication never reads it

pub mod history;
pub mod registry;
pub mod snapshot;
pub mod version;
pub mod versioned;

use thiserror::Error;

use crate::tree::TreeError;

pub use history::{CommitHistory, HistoryEntry, HistoryRecord};
pub use registry::{SlaveRecord, SlaveRegistry};
pub use snapshot::{Snapshot, SnapshotReply};
pub use version::Version;
pub use versioned::{CommitMode, StoreConfig, VersionedStore};

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller lacks a verified, write-capable identity.
    #[error("not authorized: {0}")]
    Auth(String),

    /// Payload could not be decoded or merged.
    #[error(transparent)]
    Parse(#[from] TreeError),

    /// Requested version is not (or no longer) in the history.
    #[error("version {0} not found in commit history")]
    NotFound(Version),

    /// History file could not be read at start-up.
    #[error("history persistence failed: {0}")]
    Persist(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
