//! reqwest implementation of [`ConfigClient`].

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::client::wire::{
    decode_data, encode_data, CommitRequest, ErrorResponse, HistoryQuery, PublishRequest,
    RollbackRequest, SnapshotQuery, SnapshotResponse, VersionQuery, VersionResponse,
};
use crate::client::{ConfigClient, RpcError, RpcResult};
use crate::store::{CommitMode, HistoryRecord, SnapshotReply, Version};
use crate::tree::ChangeSet;

/// HTTP client for talking to gridconf nodes.
#[derive(Clone, Default)]
pub struct HttpConfigClient {
    http: reqwest::Client,
    token: Option<String>,
}

impl HttpConfigClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present `token` as a bearer credential on every call.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Structural diff between two versions retained on the master.
    pub async fn diff_versions(
        &self,
        server: &str,
        from: &Version,
        to: &Version,
        timeout: Duration,
    ) -> RpcResult<ChangeSet> {
        let query = [("from", from.as_str()), ("to", to.as_str())];
        let request = self.request(Method::GET, server, "/config/history/diff").query(&query);
        self.send(server, request, timeout).await
    }

    /// Registered slaves of a node.
    pub async fn slaves(&self, server: &str, timeout: Duration) -> RpcResult<serde_json::Value> {
        let request = self.request(Method::GET, server, "/config/slaves");
        self.send(server, request, timeout).await
    }

    /// Node status document.
    pub async fn status(&self, server: &str, timeout: Duration) -> RpcResult<serde_json::Value> {
        let request = self.request(Method::GET, server, "/status");
        self.send(server, request, timeout).await
    }

    /// Ask a replica to refresh now.
    pub async fn force_refresh(&self, server: &str, timeout: Duration) -> RpcResult<serde_json::Value> {
        let request = self.request(Method::POST, server, "/config/refresh");
        self.send(server, request, timeout).await
    }

    fn request(&self, method: Method, server: &str, path: &str) -> RequestBuilder {
        let url = format!("{}{}", server.trim_end_matches('/'), path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        server: &str,
        request: RequestBuilder,
        timeout: Duration,
    ) -> RpcResult<T> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(server, timeout, e))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                if e.is_timeout() {
                    transport_error(server, timeout, e)
                } else {
                    RpcError::Decode {
                        server: server.to_string(),
                        message: e.to_string(),
                    }
                }
            });
        }

        let body = response.text().await.unwrap_or_default();
        let (kind, message) = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => (err.error, err.message),
            Err(_) => ("http_error".to_string(), body),
        };
        Err(RpcError::Remote {
            server: server.to_string(),
            status: status.as_u16(),
            kind,
            message,
        })
    }
}

impl ConfigClient for HttpConfigClient {
    async fn get_version(&self, server: &str, timeout: Duration) -> RpcResult<Version> {
        let request = self.request(Method::GET, server, "/config/version");
        let response: VersionResponse = self.send(server, request, timeout).await?;
        Ok(response.version)
    }

    async fn get_snapshot(
        &self,
        server: &str,
        since: Option<&Version>,
        timeout: Duration,
    ) -> RpcResult<SnapshotReply> {
        let query = SnapshotQuery { since: since.cloned() };
        let request = self.request(Method::GET, server, "/config/snapshot").query(&query);
        let response: SnapshotResponse = self.send(server, request, timeout).await?;

        let data = match response.data {
            Some(encoded) => Some(decode_payload(server, &encoded)?.into()),
            None => None,
        };
        Ok(SnapshotReply {
            version: response.version,
            data,
        })
    }

    async fn publish_slave(
        &self,
        server: &str,
        url: &str,
        version: Option<&Version>,
        timeout: Duration,
    ) -> RpcResult<()> {
        let body = PublishRequest {
            url: url.to_string(),
            version: version.cloned(),
        };
        let request = self.request(Method::POST, server, "/config/slaves").json(&body);
        let _: serde_json::Value = self.send(server, request, timeout).await?;
        Ok(())
    }

    async fn commit(
        &self,
        server: &str,
        payload: &[u8],
        mode: CommitMode,
        timeout: Duration,
    ) -> RpcResult<Version> {
        let body = CommitRequest {
            data: encode_data(payload),
            mode,
        };
        let request = self.request(Method::POST, server, "/config/commit").json(&body);
        let response: VersionResponse = self.send(server, request, timeout).await?;
        Ok(response.version)
    }

    async fn commit_history(
        &self,
        server: &str,
        limit: usize,
        timeout: Duration,
    ) -> RpcResult<Vec<HistoryRecord>> {
        let query = HistoryQuery { limit: Some(limit) };
        let request = self.request(Method::GET, server, "/config/history").query(&query);
        self.send(server, request, timeout).await
    }

    async fn historical_snapshot(
        &self,
        server: &str,
        version: &Version,
        timeout: Duration,
    ) -> RpcResult<Vec<u8>> {
        let query = VersionQuery {
            version: version.clone(),
        };
        let request = self
            .request(Method::GET, server, "/config/history/snapshot")
            .query(&query);
        let response: SnapshotResponse = self.send(server, request, timeout).await?;
        let encoded = response.data.ok_or_else(|| RpcError::Decode {
            server: server.to_string(),
            message: "historical snapshot without data".to_string(),
        })?;
        decode_payload(server, &encoded)
    }

    async fn rollback(&self, server: &str, version: &Version, timeout: Duration) -> RpcResult<Version> {
        let body = RollbackRequest {
            version: version.clone(),
        };
        let request = self.request(Method::POST, server, "/config/rollback").json(&body);
        let response: VersionResponse = self.send(server, request, timeout).await?;
        Ok(response.version)
    }
}

fn decode_payload(server: &str, encoded: &str) -> RpcResult<Vec<u8>> {
    decode_data(encoded).map_err(|e| RpcError::Decode {
        server: server.to_string(),
        message: format!("invalid snapshot encoding: {}", e),
    })
}

fn transport_error(server: &str, timeout: Duration, e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::Timeout {
            server: server.to_string(),
            timeout,
        }
    } else {
        RpcError::Transport {
            server: server.to_string(),
            message: e.to_string(),
        }
    }
}
