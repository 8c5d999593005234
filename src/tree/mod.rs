//! Configuration tree subsystem.
//!
//! # Data Flow
//! ```text
//! snapshot text
//!     → parser.rs (text → ConfigTree, fails closed)
//!     → node.rs (sections, options, path traversal)
//!     → merge.rs (overlay union) / diff.rs (ChangeSet)
//!     → codec.rs (serialize + gzip for the wire)
//! ```
//!
//! # Design Decisions
//! - Leaves are strings; typed reads live in value.rs at the consumer boundary
//! - Children keep insertion order so serialization is deterministic
//! - Reads never create nodes; only set/create/merge do
//! - Merge and patch build a new tree, the input is never half-modified

pub mod codec;
pub mod diff;
pub mod merge;
pub mod node;
pub mod parser;
pub mod value;

use thiserror::Error;

pub use diff::{Change, ChangeSet};
pub use node::{ConfigTree, Node, Section};

/// Errors raised while building, parsing or decoding a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Malformed serialized text.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A section and an option collide at the same path.
    #[error("type conflict at {path}: section and option share the same name")]
    TypeConflict { path: String },

    /// Path or name is not addressable.
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// Option value cannot be represented in the text form.
    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    /// Compressed payload could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
