//! RPC client subsystem.
//!
//! # Data Flow
//! ```text
//! RefreshAgent / CLI
//!     → ConfigClient trait (one method per remote operation)
//!     → http.rs (reqwest, per-call timeout, bearer token)
//!     → wire.rs (JSON bodies, base64 snapshot payloads)
//!     → remote node's http server
//! ```
//!
//! # Design Decisions
//! - The agent is generic over ConfigClient so replication logic can be
//!   exercised without sockets
//! - Every call takes the caller's timeout; nothing retries internally
//! - Failures carry the server they came from for aggregate reporting

pub mod http;
pub mod wire;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::store::{CommitMode, HistoryRecord, SnapshotReply, Version};

pub use http::HttpConfigClient;

/// Errors from a single remote call.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The call exceeded its budget.
    #[error("{server}: timed out after {timeout:?}")]
    Timeout { server: String, timeout: Duration },

    /// Connection-level failure.
    #[error("{server}: transport error: {message}")]
    Transport { server: String, message: String },

    /// The server answered with an error.
    #[error("{server}: {kind} ({status}): {message}")]
    Remote {
        server: String,
        status: u16,
        kind: String,
        message: String,
    },

    /// The server answered with something unreadable.
    #[error("{server}: malformed response: {message}")]
    Decode { server: String, message: String },
}

impl RpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

/// Result type for remote calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Remote operations of a configuration node.
///
/// `server` is the base URL of the node to call.
pub trait ConfigClient: Send + Sync + 'static {
    fn get_version(
        &self,
        server: &str,
        timeout: Duration,
    ) -> impl Future<Output = RpcResult<Version>> + Send;

    /// Full snapshot, or only the version when `since` is already current.
    fn get_snapshot(
        &self,
        server: &str,
        since: Option<&Version>,
        timeout: Duration,
    ) -> impl Future<Output = RpcResult<SnapshotReply>> + Send;

    fn publish_slave(
        &self,
        server: &str,
        url: &str,
        version: Option<&Version>,
        timeout: Duration,
    ) -> impl Future<Output = RpcResult<()>> + Send;

    fn commit(
        &self,
        server: &str,
        payload: &[u8],
        mode: CommitMode,
        timeout: Duration,
    ) -> impl Future<Output = RpcResult<Version>> + Send;

    fn commit_history(
        &self,
        server: &str,
        limit: usize,
        timeout: Duration,
    ) -> impl Future<Output = RpcResult<Vec<HistoryRecord>>> + Send;

    fn historical_snapshot(
        &self,
        server: &str,
        version: &Version,
        timeout: Duration,
    ) -> impl Future<Output = RpcResult<Vec<u8>>> + Send;

    fn rollback(
        &self,
        server: &str,
        version: &Version,
        timeout: Duration,
    ) -> impl Future<Output = RpcResult<Version>> + Send;
}
