//! Host engine contract
//!
//! The core never talks to a concrete database. Everything it needs from
//! the host (transaction state, the active snapshot stack, query execution
//! and hook registration) goes through these traits, so the same core runs
//! against a real engine binding or the in-memory reference host.
//!
//! All calls happen on the session's own thread; implementations need not
//! be `Sync`.

use crate::error::HostError;
use crate::snapshot::VisibilitySnapshot;
use crate::types::IsolationLevel;
use serde_json::Value as JsonValue;
use std::fmt;

/// Transaction properties and snapshot access for the current session
pub trait TransactionState {
    /// Returns true inside an explicit `BEGIN ... COMMIT` block
    fn in_transaction_block(&self) -> bool;

    /// Isolation level of the current transaction
    fn isolation_level(&self) -> IsolationLevel;

    /// Transaction nesting level; 1 at top level, higher inside savepoints
    fn nesting_level(&self) -> u32;

    /// Returns true once the transaction has taken its first snapshot
    fn first_snapshot_set(&self) -> bool;

    /// Build a fresh snapshot of the current state without registering it.
    ///
    /// Unlike [`transaction_snapshot`](Self::transaction_snapshot) this never
    /// fixes the transaction's first snapshot.
    fn capture_snapshot(&self) -> Option<VisibilitySnapshot>;

    /// The snapshot the host would use for the next statement.
    ///
    /// In a repeatable-read class transaction the first call fixes the
    /// snapshot for the rest of the transaction.
    fn transaction_snapshot(&mut self) -> Option<VisibilitySnapshot>;

    /// Make `snapshot` the transaction snapshot and mark it fixed
    fn install_transaction_snapshot(&mut self, snapshot: VisibilitySnapshot)
        -> Result<(), HostError>;
}

/// Stack of active snapshots; the top one governs visibility of the
/// statement being executed.
pub trait SnapshotStack {
    /// Push `snapshot` as the active snapshot
    fn push_active_snapshot(&mut self, snapshot: VisibilitySnapshot);

    /// Pop the active snapshot, returning it
    fn pop_active_snapshot(&mut self) -> Option<VisibilitySnapshot>;

    /// Current active snapshot, if any
    fn active_snapshot(&self) -> Option<&VisibilitySnapshot>;
}

/// Status of an executed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Row-returning query
    Select,
    /// Data-modifying statement
    Modify,
    /// Utility statement (DDL and the like)
    Utility,
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecStatus::Select => "SELECT",
            ExecStatus::Modify => "MODIFY",
            ExecStatus::Utility => "UTILITY",
        };
        f.write_str(s)
    }
}

/// One result row: column values, `None` for SQL null
pub type Row = Vec<Option<JsonValue>>;

/// Result of executing a statement through [`QueryRunner`]
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// What kind of statement ran
    pub status: ExecStatus,
    /// Rows produced, in order
    pub rows: Vec<Row>,
}

/// Executes SQL on behalf of the core within the session's transaction
pub trait QueryRunner {
    /// Acquire the query-execution connection
    fn connect(&mut self) -> Result<(), HostError>;

    /// Execute `sql`, binding `params` positionally to `$1..$n` as text.
    ///
    /// `None` binds SQL null. With `read_only` set the host must refuse
    /// statements that modify data.
    fn execute(
        &mut self,
        sql: &str,
        params: &[Option<String>],
        read_only: bool,
    ) -> Result<QueryOutcome, HostError>;

    /// Release the connection acquired by [`connect`](Self::connect)
    fn finish(&mut self);
}

/// Transaction boundary events delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XactEvent {
    /// Commit is about to happen
    PreCommit,
    /// Transaction committed
    Commit,
    /// Transaction aborted
    Abort,
    /// Prepare is about to happen
    PrePrepare,
    /// Transaction prepared for two-phase commit
    Prepare,
    /// Parallel worker: commit is about to happen
    ParallelPreCommit,
    /// Parallel worker: transaction committed
    ParallelCommit,
    /// Parallel worker: transaction aborted
    ParallelAbort,
}

impl XactEvent {
    /// Returns true if the event ends the transaction
    pub fn ends_transaction(&self) -> bool {
        matches!(
            self,
            XactEvent::Commit
                | XactEvent::Abort
                | XactEvent::Prepare
                | XactEvent::ParallelCommit
                | XactEvent::ParallelAbort
        )
    }
}

impl fmt::Display for XactEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            XactEvent::PreCommit => "pre-commit",
            XactEvent::Commit => "commit",
            XactEvent::Abort => "abort",
            XactEvent::PrePrepare => "pre-prepare",
            XactEvent::Prepare => "prepare",
            XactEvent::ParallelPreCommit => "parallel pre-commit",
            XactEvent::ParallelCommit => "parallel commit",
            XactEvent::ParallelAbort => "parallel abort",
        };
        f.write_str(s)
    }
}

/// Interception points the host exposes to extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookKind {
    /// Runs before each query starts executing
    QueryStart,
    /// Receives transaction boundary events
    TransactionCallback,
}

/// Registration of extension hooks with the host
pub trait HookRegistry {
    /// Register interest in `kind`
    fn register_hook(&mut self, kind: HookKind);

    /// Drop interest in `kind`
    fn unregister_hook(&mut self, kind: HookKind);
}

/// Everything the core needs from a host engine
pub trait HostEngine: TransactionState + SnapshotStack + QueryRunner + HookRegistry {}

impl<T> HostEngine for T where T: TransactionState + SnapshotStack + QueryRunner + HookRegistry {}
