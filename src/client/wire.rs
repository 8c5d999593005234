//! JSON bodies exchanged between nodes.
//!
//! Snapshot payloads travel as base64 of the gzip-compressed text form.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::store::{CommitMode, SlaveRecord, Version};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: Version,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotQuery {
    pub since: Option<Version>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub url: String,
    #[serde(default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub data: String,
    #[serde(default)]
    pub mode: CommitMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionQuery {
    pub version: Version,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffQuery {
    pub from: Version,
    pub to: Version,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub version: Version,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub outcome: String,
    pub version: Version,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub name: String,
    pub role: String,
    pub version: Version,
    pub slaves: Vec<SlaveRecord>,
    /// Seconds since the last successful refresh (replicas only).
    #[serde(default)]
    pub last_refresh_secs: Option<u64>,
}

/// Body of every non-2xx answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub fn encode_data(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_data(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(data.as_bytes())
}
