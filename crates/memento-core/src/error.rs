//! Crate-wide error type for the Memento knowledge-graph sync engine.
//!
//! Every operation surface in this workspace (graph store, vector store,
//! embedding dispatcher, KGS, temporal layer, coordinator) returns
//! `memento_core::Result<T>`. Variants carry an explicit `ErrorKind` so the
//! coordinator (`memento-sync`) can classify failures per spec §7 without
//! string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification used by the Synchronization Coordinator to decide whether
/// an operation is eligible for retry (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Parser failure for a single file. Recoverable.
    Parse,
    /// Backing store (graph/vector/cache) call failed. Recoverable.
    Database,
    /// A conflict was detected between inbound and stored state. Recoverable;
    /// resolution policy applies.
    Conflict,
    /// A single item failed validation; the operation continues. Non-recoverable
    /// for the offending item only.
    Validation,
    /// The operation was cancelled by the caller.
    Cancellation,
    /// The operation exceeded its guard window or deadline.
    Timeout,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Whether an error of this kind makes the owning operation eligible for retry.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Parse | Self::Database | Self::Conflict)
    }
}

/// The crate-wide error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A parser reported a recoverable error for one file.
    #[error("parse error in {file}:{line}:{column}: {message}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// 1-based line number, 0 if unknown.
        line: u32,
        /// 1-based column number, 0 if unknown.
        column: u32,
        /// Human-readable parser message.
        message: String,
    },

    /// A call to the graph store, vector store, or KV cache failed.
    #[error("store operation failed: {0}")]
    Database(String),

    /// A conflict was detected during upsert.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An inbound item failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation was cancelled.
    #[error("operation cancelled: {0}")]
    Cancellation(String),

    /// The operation timed out.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// A referenced entity does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// A relationship referenced an endpoint that does not exist.
    #[error("relationship endpoint missing: {0}")]
    MissingEndpoint(String),

    /// A required parameter was missing or malformed.
    #[error("missing or invalid parameter: {0}")]
    InvalidParameter(String),

    /// A relationship type was not in the caller's allow-list.
    #[error("relationship type not allowed: {0}")]
    DisallowedRelationshipType(String),

    /// Catch-all for anything not classified above.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify this error per spec §7, for coordinator retry decisions.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Database(_) => ErrorKind::Database,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Cancellation(_) => ErrorKind::Cancellation,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::EntityNotFound(_) | Self::MissingEndpoint(_) => ErrorKind::Database,
            Self::InvalidParameter(_) | Self::DisallowedRelationshipType(_) => {
                ErrorKind::Validation
            }
            Self::Other(_) => ErrorKind::Unknown,
        }
    }

    /// Convenience constructor for store failures.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Convenience constructor for catch-all failures.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
