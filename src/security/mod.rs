//! Caller identity and authentication.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>
//!     → auth.rs (token → identity name, writer check)
//!     → Identity attached to the request extensions
//!     → store commit/rollback decide on is_authenticated / can_write
//! ```
//!
//! # Design Decisions
//! - Requests without a valid token still pass, as anonymous; only write
//!   operations look at the identity
//! - The store never sees tokens, only the resolved Identity

pub mod auth;

pub use auth::{identity_middleware, TokenAuthenticator};

/// Who is calling, as far as the auth layer could verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    name: Option<String>,
    can_write: bool,
}

impl Identity {
    /// Caller without verified credentials.
    pub fn anonymous() -> Self {
        Self {
            name: None,
            can_write: false,
        }
    }

    /// Verified caller allowed to read only.
    pub fn reader(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            can_write: false,
        }
    }

    /// Verified caller allowed to commit and roll back.
    pub fn writer(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            can_write: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.name.is_some()
    }

    pub fn can_write(&self) -> bool {
        self.is_authenticated() && self.can_write
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}
