//! HTTP surface of a node.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum router, tower-http layers, graceful shutdown)
//!     → request.rs (x-request-id, request span)
//!     → security::identity_middleware (bearer token → Identity)
//!     → handlers.rs (master store or replica agent)
//!     → error.rs ({error, message} bodies)
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, NodeHandle, NodeServer};
