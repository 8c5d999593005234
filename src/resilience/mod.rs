//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Remote call to a candidate server:
//!     → timeouts.rs (enforce the per-call budget)
//!     → On failure: caller moves to the next candidate
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every remote call has a deadline
//! - No retry against the same server within one refresh cycle
//! - Timeout errors are distinct from other errors

pub mod timeouts;
