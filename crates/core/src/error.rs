//! Error types for point-in-time reads
//!
//! Every failure the core can report is a variant of [`AsOfError`]. We use
//! `thiserror` for the `Display` and `Error` implementations.
//!
//! None of these errors are transient: a malformed or illegally timed
//! snapshot is a caller error, so nothing here is ever retried.

use crate::types::IsolationLevel;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, AsOfError>;

/// Hint attached to read-only gate rejections.
pub const READ_ONLY_HINT: &str = "The query must start with SELECT or WITH";

/// Errors surfaced to the caller of a snapshot operation
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Input | `MalformedSnapshot`, `UnsupportedQuery`, `InvalidArgument` | Bad caller input |
/// | Guardrail | `NoActiveTransaction`, `WrongIsolationLevel`, `InSubtransaction`, `SnapshotAlreadyFixed` | Installation not legal now |
/// | System | `Internal`, `Config` | Host failures and bad configuration |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsOfError {
    /// Snapshot text failed to parse or violates a snapshot invariant
    #[error("malformed snapshot: {reason}")]
    MalformedSnapshot {
        /// What was wrong with the text
        reason: String,
    },

    /// Installation requested outside an explicit transaction block
    #[error("snapshot can only be installed inside a transaction block")]
    NoActiveTransaction,

    /// Isolation level re-fetches snapshots per statement
    #[error("snapshot can only be installed in a REPEATABLE READ or SERIALIZABLE transaction, not {level}")]
    WrongIsolationLevel {
        /// Isolation level of the current transaction
        level: IsolationLevel,
    },

    /// Installation requested from inside a subtransaction
    #[error("snapshot cannot be installed from a subtransaction (nesting level {depth})")]
    InSubtransaction {
        /// Current transaction nesting level
        depth: u32,
    },

    /// The transaction already took its first snapshot
    #[error("snapshot must be installed before any query in the transaction")]
    SnapshotAlreadyFixed,

    /// SQL rejected by the read-only gate
    #[error("unsupported query: {reason}")]
    UnsupportedQuery {
        /// Why the query was rejected
        reason: String,
        /// Suggestion shown to the user
        hint: &'static str,
    },

    /// Query argument could not be converted for binding
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument
        reason: String,
    },

    /// Missing base snapshot, unexpected row count, or host failure
    #[error("internal error: {reason}")]
    Internal {
        /// Description of the failure
        reason: String,
    },

    /// Configuration could not be read or is inconsistent
    #[error("configuration error: {reason}")]
    Config {
        /// Description of the problem
        reason: String,
    },
}

impl AsOfError {
    /// Create a malformed-snapshot error
    pub fn malformed(reason: impl Into<String>) -> Self {
        AsOfError::MalformedSnapshot {
            reason: reason.into(),
        }
    }

    /// Create a read-only gate rejection
    pub fn unsupported_query(reason: impl Into<String>) -> Self {
        AsOfError::UnsupportedQuery {
            reason: reason.into(),
            hint: READ_ONLY_HINT,
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        AsOfError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        AsOfError::Internal {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        AsOfError::Config {
            reason: reason.into(),
        }
    }

    /// SQLSTATE code reported to the client
    pub fn sqlstate(&self) -> &'static str {
        match self {
            AsOfError::MalformedSnapshot { .. } | AsOfError::InvalidArgument { .. } => "22023",
            AsOfError::NoActiveTransaction => "25P01",
            AsOfError::WrongIsolationLevel { .. }
            | AsOfError::InSubtransaction { .. }
            | AsOfError::SnapshotAlreadyFixed => "25001",
            AsOfError::UnsupportedQuery { .. } => "0A000",
            AsOfError::Internal { .. } => "XX000",
            AsOfError::Config { .. } => "F0000",
        }
    }

    /// Hint for the user, if the error carries one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AsOfError::UnsupportedQuery { hint, .. } => Some(*hint),
            _ => None,
        }
    }

    /// Returns true if the caller caused this error (bad input or bad timing)
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, AsOfError::Internal { .. } | AsOfError::Config { .. })
    }

    /// Returns true for the four guardrail rejections
    pub fn is_guardrail(&self) -> bool {
        matches!(
            self,
            AsOfError::NoActiveTransaction
                | AsOfError::WrongIsolationLevel { .. }
                | AsOfError::InSubtransaction { .. }
                | AsOfError::SnapshotAlreadyFixed
        )
    }
}

/// Failure reported by the host engine
///
/// Host failures are never interpreted by the core; they surface to the
/// caller as [`AsOfError::Internal`] with the host's message preserved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HostError {
    /// Host-provided description
    pub message: String,
}

impl HostError {
    /// Create a host error from a message
    pub fn new(message: impl Into<String>) -> Self {
        HostError {
            message: message.into(),
        }
    }
}

impl From<HostError> for AsOfError {
    fn from(e: HostError) -> Self {
        AsOfError::internal(e.message)
    }
}
