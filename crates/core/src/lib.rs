//! Core types and traits for point-in-time reads
//!
//! This crate defines the foundational pieces shared by every layer:
//! - TxnId, CommandId, IsolationLevel: transaction vocabulary
//! - VisibilitySnapshot: the host's MVCC snapshot and its visibility test
//! - SnapshotDescriptor: the `xmin:xmax:xip` text codec
//! - AsOfError: error type hierarchy
//! - Traits: the host engine contract (TransactionState, SnapshotStack,
//!   QueryRunner, HookRegistry)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod snapshot;
pub mod traits;
pub mod types;

pub use codec::{SnapshotDescriptor, DEFAULT_MAX_IN_PROGRESS};
pub use error::{AsOfError, HostError, Result, READ_ONLY_HINT};
pub use snapshot::VisibilitySnapshot;
pub use traits::{
    ExecStatus, HookKind, HookRegistry, HostEngine, QueryOutcome, QueryRunner, Row,
    SnapshotStack, TransactionState, XactEvent,
};
pub use types::{CommandId, IsolationLevel, TxnId};
