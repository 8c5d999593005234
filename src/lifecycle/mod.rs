//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     ServiceConfig → store or agent → router → bind listener → serve
//!
//! Shutdown (shutdown.rs):
//!     trigger → broadcast → server drains, automatic refresh loop exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener is bound last, once the store or agent exists

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
