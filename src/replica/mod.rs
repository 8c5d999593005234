//! Replica subsystem.
//!
//! # Data Flow
//! ```text
//! timer tick / on-demand call
//!     → agent.rs single-flight guard
//!     → candidates.rs (gateway alone, else shuffled servers + master)
//!     → per candidate: version → snapshot → decode
//!     → atomic swap of the local Arc<Snapshot>
//!     → (automatic mode) publish own URL + version upstream
//! ```
//!
//! # Design Decisions
//! - First candidate with a newer version wins; the rest are not contacted
//! - A candidate that is merely not newer is an answer, not a failure
//! - Only "every candidate failed" is reported upward
//! - Readers keep the last good tree forever if nothing answers

pub mod agent;
pub mod candidates;
pub mod gateway;

use thiserror::Error;

pub use agent::{AgentConfig, RefreshAgent, RefreshOutcome, SkipReason};
pub use gateway::GatewayResolver;

/// Errors reported by a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// No candidate produced an answer.
    #[error("no server available ({tried} tried): {last_error}")]
    NoServerAvailable { tried: usize, last_error: String },
}

/// Result type for refresh operations.
pub type RefreshResult<T> = Result<T, RefreshError>;
