//! Installation guardrails
//!
//! A synthetic snapshot may replace the transaction snapshot only when all
//! four conditions hold:
//!
//! 1. the session is inside an explicit transaction block
//! 2. the isolation level fixes one snapshot for the whole transaction
//! 3. the session is not inside a subtransaction
//! 4. the transaction has not yet taken its first snapshot
//!
//! Installing later than (4) would make the synthetic view inconsistent with
//! queries that already ran. The state is derived from the host on every
//! check and never cached, so checking again at the real installation point
//! catches anything that changed since the request.

use asof_core::{AsOfError, IsolationLevel, Result, TransactionState, VisibilitySnapshot};
use tracing::warn;

/// Snapshot of the four transaction properties the guardrail reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardrailState {
    /// Inside `BEGIN ... COMMIT`
    pub in_transaction_block: bool,
    /// Isolation level of the transaction
    pub isolation_level: IsolationLevel,
    /// Transaction nesting level, 1 at top level
    pub nesting_level: u32,
    /// Transaction already took its first snapshot
    pub first_snapshot_set: bool,
}

impl GuardrailState {
    /// Read the current state from the host
    pub fn observe<T: TransactionState + ?Sized>(host: &T) -> Self {
        GuardrailState {
            in_transaction_block: host.in_transaction_block(),
            isolation_level: host.isolation_level(),
            nesting_level: host.nesting_level(),
            first_snapshot_set: host.first_snapshot_set(),
        }
    }

    /// Check the four conditions in order, reporting the first failure
    pub fn check(&self) -> Result<()> {
        if !self.in_transaction_block {
            return Err(AsOfError::NoActiveTransaction);
        }
        if !self.isolation_level.uses_transaction_snapshot() {
            return Err(AsOfError::WrongIsolationLevel {
                level: self.isolation_level,
            });
        }
        if self.nesting_level > 1 {
            return Err(AsOfError::InSubtransaction {
                depth: self.nesting_level,
            });
        }
        if self.first_snapshot_set {
            return Err(AsOfError::SnapshotAlreadyFixed);
        }
        Ok(())
    }
}

/// Verify installation is legal and return the base snapshot to overlay.
///
/// The base is captured without fixing the transaction's first snapshot, so
/// the check can run again when the snapshot is actually installed.
pub fn ensure_installable<T: TransactionState + ?Sized>(host: &T) -> Result<VisibilitySnapshot> {
    let state = GuardrailState::observe(host);
    if let Err(e) = state.check() {
        warn!(target: "asof::guardrail", ?state, error = %e, "Snapshot installation rejected");
        return Err(e);
    }
    host.capture_snapshot()
        .ok_or_else(|| AsOfError::internal("host returned no transaction snapshot"))
}
