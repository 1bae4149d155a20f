//! Core types for point-in-time reads
//!
//! This module defines the foundational types:
//! - TxnId: Transaction identifier used by visibility bounds
//! - CommandId: Command counter within a transaction
//! - IsolationLevel: Transaction isolation level reported by the host

use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction identifier.
///
/// Ids below a snapshot's `xmin` are always visible, ids at or above its
/// `xmax` are never visible. The text form is the plain decimal value, the
/// same form the host uses for its 64-bit snapshot type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    /// The invalid transaction id
    pub const INVALID: TxnId = TxnId(0);

    /// First id handed out to ordinary transactions
    pub const FIRST_NORMAL: TxnId = TxnId(3);

    /// Create a TxnId from its raw value
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the next id
    #[inline]
    pub fn next(&self) -> TxnId {
        TxnId(self.0 + 1)
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TxnId {
    fn from(value: u64) -> Self {
        TxnId(value)
    }
}

/// Command counter within a transaction; carried through snapshots unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct CommandId(pub u32);

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Behaves as read committed
    ReadUncommitted,
    /// New snapshot for every statement
    ReadCommitted,
    /// One snapshot for the whole transaction
    RepeatableRead,
    /// One snapshot for the whole transaction, plus serializability checks
    Serializable,
}

impl IsolationLevel {
    /// Returns true if the level fixes one snapshot for the whole transaction.
    pub fn uses_transaction_snapshot(&self) -> bool {
        matches!(
            self,
            IsolationLevel::RepeatableRead | IsolationLevel::Serializable
        )
    }

    /// SQL spelling of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::ReadCommitted
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
