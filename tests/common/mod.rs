//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gridconf::client::HttpConfigClient;
use gridconf::config::{NodeRole, ServiceConfig};
use gridconf::http::NodeHandle;
use gridconf::lifecycle::startup::build_node;
use gridconf::lifecycle::Shutdown;
use gridconf::replica::RefreshAgent;
use gridconf::store::{CommitMode, Version, VersionedStore};
use gridconf::tree::codec::encode_snapshot;
use gridconf::tree::ConfigTree;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// A node serving on an ephemeral local port.
pub struct TestNode {
    pub url: String,
    pub handle: NodeHandle,
    pub shutdown: Shutdown,
}

impl TestNode {
    pub fn store(&self) -> Arc<VersionedStore> {
        match &self.handle {
            NodeHandle::Master(store) => store.clone(),
            NodeHandle::Replica(_) => panic!("{} is not a master", self.url),
        }
    }

    pub fn agent(&self) -> Arc<RefreshAgent<HttpConfigClient>> {
        match &self.handle {
            NodeHandle::Replica(agent) => agent.clone(),
            NodeHandle::Master(_) => panic!("{} is not a replica", self.url),
        }
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

pub fn base_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.auth.tokens.insert("admin".into(), ADMIN_TOKEN.into());
    config.auth.writers.push("admin".into());
    config.timeouts.call_secs = 1;
    config
}

/// Start a master seeded with `text`.
pub async fn spawn_master(text: &str) -> TestNode {
    let mut config = base_config();
    config.node.role = NodeRole::Master;
    config.node.name = "master".into();

    let (listener, url) = bind().await;
    let node = build_node(&config).unwrap();
    let handle = node.handle.clone();
    if let NodeHandle::Master(store) = &handle {
        if !text.is_empty() {
            let tree = ConfigTree::load(text).unwrap();
            store
                .commit_tree(tree, CommitMode::Replace, &gridconf::security::Identity::writer("admin"))
                .unwrap();
        }
    }
    let shutdown = Shutdown::new();
    let serving = shutdown.clone();
    tokio::spawn(async move { node.serve(listener, &serving).await });

    TestNode { url, handle, shutdown }
}

/// Start a replica. `configure` adjusts the replica section before build.
pub async fn spawn_replica(configure: impl FnOnce(&mut ServiceConfig)) -> TestNode {
    let mut config = base_config();
    config.node.role = NodeRole::Replica;
    config.node.name = "replica".into();
    config.replica.automatic = false;
    config.replica.propagation_interval_secs = 1;

    let (listener, url) = bind().await;
    config.replica.own_url = Some(url.clone());
    configure(&mut config);

    let node = build_node(&config).unwrap();
    let handle = node.handle.clone();
    let shutdown = Shutdown::new();
    let serving = shutdown.clone();
    tokio::spawn(async move { node.serve(listener, &serving).await });

    TestNode { url, handle, shutdown }
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("http://{}", addr))
}

pub fn admin_client() -> HttpConfigClient {
    HttpConfigClient::new().with_token(ADMIN_TOKEN)
}

pub fn payload(text: &str) -> Vec<u8> {
    encode_snapshot(&ConfigTree::load(text).unwrap()).unwrap()
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

pub async fn wait_for_version(agent: &RefreshAgent<HttpConfigClient>, version: &Version) -> bool {
    eventually(Duration::from_secs(10), move || async move { agent.version() == *version }).await
}

/// A server that accepts connections and never answers.
pub async fn start_hanging_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// A server answering every request with `status` and `body`.
pub async fn start_fixed_backend(status: u16, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
