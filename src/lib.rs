//! gridconf: versioned configuration tree with master/replica propagation.
//!
//! ```text
//!            commit / rollback                    pull (version, snapshot)
//!  operator ───────────────────▶ master ◀──────────────────────────── replica
//!                                  │  VersionedStore                   │ RefreshAgent
//!                                  │  CommitHistory                    │ (automatic or on demand)
//!                                  ▼                                   ▼
//!                             Snapshot {version, tree, gzip}     local Snapshot
//!                                                                      ▲
//!                                              sub-replica ────────────┘
//! ```

// Data model
pub mod store;
pub mod tree;

// Roles and transport
pub mod client;
pub mod http;
pub mod replica;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::ServiceConfig;
pub use http::NodeServer;
pub use lifecycle::Shutdown;
pub use replica::RefreshAgent;
pub use store::VersionedStore;
pub use tree::ConfigTree;
