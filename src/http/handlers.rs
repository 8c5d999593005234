//! Route handlers for both roles.
//!
//! Reads are served from the current snapshot without touching the commit
//! lock. Writes go to the master's store; a replica answers them with
//! `wrong_role`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::client::wire::{
    decode_data, encode_data, CommitRequest, DiffQuery, HistoryQuery, PublishRequest,
    RefreshResponse, RollbackRequest, SnapshotQuery, SnapshotResponse, StatusResponse,
    VersionQuery, VersionResponse,
};
use crate::client::HttpConfigClient;
use crate::http::error::ApiError;
use crate::http::server::{AppState, NodeHandle};
use crate::replica::RefreshAgent;
use crate::security::Identity;
use crate::store::versioned::MAX_HISTORY_LISTING;
use crate::store::{HistoryRecord, SlaveRecord, Snapshot, VersionedStore};
use crate::tree::ChangeSet;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let (role, last_refresh_secs) = match &state.node {
        NodeHandle::Master(_) => ("master", None),
        NodeHandle::Replica(agent) => (
            "replica",
            agent.last_refresh_elapsed().map(|d| d.as_secs()),
        ),
    };
    Json(StatusResponse {
        name: state.name.clone(),
        role: role.to_string(),
        version: current(&state).version.clone(),
        slaves: state.slaves.list(),
        last_refresh_secs,
    })
}

pub async fn get_version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: current(&state).version.clone(),
    })
}

pub async fn get_snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Json<SnapshotResponse> {
    let reply = current(&state).reply_for(query.since.as_ref());
    Json(SnapshotResponse {
        version: reply.version,
        data: reply.data.map(|d| encode_data(&d)),
    })
}

pub async fn publish_slave(
    State(state): State<AppState>,
    Json(body): Json<PublishRequest>,
) -> Json<Value> {
    state.slaves.register(&body.url, body.version);
    Json(json!({}))
}

pub async fn list_slaves(State(state): State<AppState>) -> Json<Vec<SlaveRecord>> {
    Json(state.slaves.list())
}

pub async fn commit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CommitRequest>,
) -> Result<Json<VersionResponse>, ApiError> {
    let store = master(&state)?;
    require_authenticated(&identity)?;

    let payload = decode_data(&body.data)
        .map_err(|e| ApiError::BadRequest(format!("invalid snapshot encoding: {}", e)))?;
    let version = store.commit(&payload, body.mode, &identity)?;
    Ok(Json(VersionResponse { version }))
}

pub async fn commit_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    let store = master(&state)?;
    let limit = query.limit.unwrap_or(MAX_HISTORY_LISTING);
    Ok(Json(store.commit_history(limit)))
}

pub async fn historical_snapshot(
    State(state): State<AppState>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let store = master(&state)?;
    let data = store.historical_snapshot(&query.version)?;
    Ok(Json(SnapshotResponse {
        version: query.version,
        data: Some(encode_data(&data)),
    }))
}

pub async fn diff_versions(
    State(state): State<AppState>,
    Query(query): Query<DiffQuery>,
) -> Result<Json<ChangeSet>, ApiError> {
    let store = master(&state)?;
    Ok(Json(store.diff_versions(&query.from, &query.to)?))
}

pub async fn rollback(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<RollbackRequest>,
) -> Result<Json<VersionResponse>, ApiError> {
    let store = master(&state)?;
    require_authenticated(&identity)?;
    let version = store.rollback(&body.version, &identity)?;
    Ok(Json(VersionResponse { version }))
}

pub async fn force_refresh(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let agent = replica(&state)?;
    require_authenticated(&identity)?;

    tracing::info!(caller = %identity.name(), "Forced refresh requested");
    let outcome = agent.force_refresh().await?;
    Ok(Json(RefreshResponse {
        outcome: outcome.label().to_string(),
        version: agent.version(),
    }))
}

fn current(state: &AppState) -> Arc<Snapshot> {
    match &state.node {
        NodeHandle::Master(store) => store.snapshot(),
        NodeHandle::Replica(agent) => {
            if !agent.is_automatic() {
                let agent = Arc::clone(agent);
                tokio::spawn(async move {
                    if let Err(e) = agent.refresh_if_needed().await {
                        tracing::warn!(error = %e, "Background refresh failed");
                    }
                });
            }
            agent.snapshot()
        }
    }
}

fn master(state: &AppState) -> Result<&Arc<VersionedStore>, ApiError> {
    match &state.node {
        NodeHandle::Master(store) => Ok(store),
        NodeHandle::Replica(_) => Err(ApiError::WrongRole(
            "this node is a replica; send writes to the master".to_string(),
        )),
    }
}

fn replica(state: &AppState) -> Result<&Arc<RefreshAgent<HttpConfigClient>>, ApiError> {
    match &state.node {
        NodeHandle::Replica(agent) => Ok(agent),
        NodeHandle::Master(_) => Err(ApiError::WrongRole(
            "this node is the master and does not refresh".to_string(),
        )),
    }
}

fn require_authenticated(identity: &Identity) -> Result<(), ApiError> {
    if identity.is_authenticated() {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("missing or unknown bearer token".to_string()))
    }
}
