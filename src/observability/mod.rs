//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! store / replica / http handlers produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every request span
//! - Metric updates are free when no recorder is installed

pub mod logging;
pub mod metrics;
