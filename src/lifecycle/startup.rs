//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the master store (seeded, or resumed from history) or the
//!   replica agent from the service configuration
//! - Start background tasks (metrics, automatic refresh, signals)
//! - Bind the listener and serve until shutdown

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::client::HttpConfigClient;
use crate::config::{NodeRole, ServiceConfig};
use crate::http::{AppState, NodeHandle, NodeServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::replica::RefreshAgent;
use crate::security::TokenAuthenticator;
use crate::store::{SlaveRegistry, StoreError, VersionedStore};
use crate::tree::{ConfigTree, TreeError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot read seed file {path}: {source}")]
    SeedRead { path: String, source: std::io::Error },

    #[error("invalid seed file {path}: {source}")]
    SeedParse { path: String, source: TreeError },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid address '{0}'")]
    Address(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A node assembled from configuration, not yet serving.
pub struct Node {
    pub server: NodeServer,
    pub handle: NodeHandle,
    /// Whether the replica's automatic loop should run.
    pub automatic: bool,
}

impl Node {
    /// Start background tasks and serve on `listener` until `shutdown`.
    pub async fn serve(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        self.spawn_refresh_loop(shutdown);
        self.server.run(listener, shutdown.subscribe()).await
    }

    fn spawn_refresh_loop(&self, shutdown: &Shutdown) {
        if let (NodeHandle::Replica(agent), true) = (&self.handle, self.automatic) {
            tokio::spawn(Arc::clone(agent).run_automatic(shutdown.subscribe()));
        }
    }
}

/// Assemble the store or agent, the registry and the router.
pub fn build_node(config: &ServiceConfig) -> Result<Node, StartupError> {
    let handle = match config.node.role {
        NodeRole::Master => {
            let seed = load_seed(config.master.seed_path.as_deref())?;
            let store = VersionedStore::open(config.master.store_config(), seed)?;
            NodeHandle::Master(Arc::new(store))
        }
        NodeRole::Replica => {
            let mut client = HttpConfigClient::new();
            if let Some(token) = &config.auth.upstream_token {
                client = client.with_token(token.clone());
            }
            let agent = RefreshAgent::new(client, config.replica.agent_config(&config.timeouts));
            NodeHandle::Replica(Arc::new(agent))
        }
    };

    let state = AppState {
        node: handle.clone(),
        slaves: Arc::new(SlaveRegistry::with_grace_time(Duration::from_secs(
            config.node.slaves_grace_secs,
        ))),
        name: config.node.name.clone(),
    };
    let auth = Arc::new(TokenAuthenticator::from_config(&config.auth));
    let server = NodeServer::new(state, auth, Duration::from_secs(config.timeouts.request_secs));

    Ok(Node {
        server,
        handle,
        automatic: config.node.role == NodeRole::Replica && config.replica.automatic,
    })
}

/// Run a node from configuration until a termination signal.
pub async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let node = build_node(&config)?;
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    tracing::info!(
        name = %config.node.name,
        role = ?config.node.role,
        bind_address = %config.listener.bind_address,
        "Node configured"
    );

    match &config.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = config
                .listener
                .bind_address
                .parse()
                .map_err(|_| StartupError::Address(config.listener.bind_address.clone()))?;
            node.spawn_refresh_loop(&shutdown);
            node.server.run_tls(addr, tls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            node.serve(listener, &shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn load_seed(path: Option<&str>) -> Result<ConfigTree, StartupError> {
    let Some(path) = path else {
        return Ok(ConfigTree::new());
    };
    let text = std::fs::read_to_string(Path::new(path)).map_err(|source| StartupError::SeedRead {
        path: path.to_string(),
        source,
    })?;
    let tree = ConfigTree::load(&text).map_err(|source| StartupError::SeedParse {
        path: path.to_string(),
        source,
    })?;
    tracing::info!(path = %path, "Loaded seed configuration");
    Ok(tree)
}
