//! Service configuration subsystem.
//!
//! This is the node's own start-up configuration, not the replicated tree.
//!
//! # Data Flow
//! ```text
//! gridconf.toml
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → ServiceConfig (immutable)
//!     → StoreConfig / AgentConfig / TokenAuthenticator
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, ListenerConfig, MasterConfig, NodeConfig, NodeRole, ObservabilityConfig,
    ReplicaConfig, ServiceConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
