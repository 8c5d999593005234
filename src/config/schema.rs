//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::replica::AgentConfig;
use crate::store::StoreConfig;

/// Root configuration for a gridconf node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Role of this node.
    pub node: NodeConfig,

    /// Settings used when running as master.
    pub master: MasterConfig,

    /// Settings used when running as replica.
    pub replica: ReplicaConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Bearer tokens and writers.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9135").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9135".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    #[default]
    Replica,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    pub role: NodeRole,

    /// Name used in logs and the status endpoint.
    pub name: String,

    /// Seconds after which a replica that stopped announcing itself is
    /// dropped from the slave listing.
    pub slaves_grace_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: NodeRole::Replica,
            name: "gridconf".to_string(),
            slaves_grace_secs: 600,
        }
    }
}

/// Master settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Maximum number of retained commits (oldest dropped first).
    pub history_max_length: usize,

    /// JSON file the history is persisted to, if any.
    pub history_path: Option<String>,

    /// Tree loaded at first start when no history exists.
    pub seed_path: Option<String>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            history_max_length: 100,
            history_path: None,
            seed_path: None,
        }
    }
}

impl MasterConfig {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            history_max_length: self.history_max_length,
            history_path: self.history_path.as_ref().map(PathBuf::from),
        }
    }
}

/// Replica settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplicaConfig {
    /// URL other nodes reach this replica at. Required to publish.
    pub own_url: Option<String>,

    /// The master (or intermediate) this replica announces itself to.
    pub master_url: Option<String>,

    /// Servers to pull from, tried in random order.
    pub servers: Vec<String>,

    /// Forced single upstream; replaces `servers` when set.
    pub gateway_url: Option<String>,

    /// Option path in the replicated tree that may name a gateway.
    pub gateway_option: Option<String>,

    /// Minimum seconds between on-demand refreshes.
    pub refresh_interval_secs: u64,

    /// Minimum seconds between on-demand attempts after one found no server.
    pub retry_interval_secs: u64,

    /// Seconds between automatic pulls.
    pub propagation_interval_secs: u64,

    /// Announce this replica to its upstream.
    pub auto_publish: bool,

    /// Run the automatic refresh loop.
    pub automatic: bool,

    /// Ticks a forced refresh waits for one already in flight.
    pub force_wait_ticks: u32,

    /// Length of one wait tick in milliseconds.
    pub tick_ms: u64,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            own_url: None,
            master_url: None,
            servers: Vec::new(),
            gateway_url: None,
            gateway_option: None,
            refresh_interval_secs: 300,
            retry_interval_secs: 30,
            propagation_interval_secs: 60,
            auto_publish: true,
            automatic: true,
            force_wait_ticks: 5,
            tick_ms: 1000,
        }
    }
}

impl ReplicaConfig {
    pub fn agent_config(&self, timeouts: &TimeoutConfig) -> AgentConfig {
        AgentConfig {
            own_url: self.own_url.clone(),
            master_url: self.master_url.clone(),
            servers: self.servers.clone(),
            gateway_url: self.gateway_url.clone(),
            gateway_option: self.gateway_option.clone(),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            retry_interval: Duration::from_secs(self.retry_interval_secs),
            propagation_interval: Duration::from_secs(self.propagation_interval_secs),
            auto_publish: self.auto_publish,
            call_timeout: Duration::from_secs(timeouts.call_secs),
            force_wait: Duration::from_millis(self.tick_ms * u64::from(self.force_wait_ticks)),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Budget for one remote call (version, snapshot, publish, commit).
    pub call_secs: u64,

    /// Server-side request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_secs: 10,
            request_secs: 30,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity name -> bearer token.
    pub tokens: HashMap<String, String>,

    /// Identities allowed to commit and roll back.
    pub writers: Vec<String>,

    /// Token this node presents to its upstream, if any.
    pub upstream_token: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
