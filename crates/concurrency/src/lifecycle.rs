//! Staged installation tied to transaction boundaries
//!
//! State transitions:
//! - `Idle` → `Staged` (snapshot validated and staged)
//! - `Staged` → `Idle` (taken for installation, or boundary event)
//!
//! Commit, abort and prepare (and their parallel-worker equivalents) clear
//! the slot unconditionally, so a snapshot validated in one transaction can
//! never leak into the next one on the same session.

use crate::snapshot::SyntheticSnapshot;
use asof_core::XactEvent;
use tracing::debug;

/// A synthetic snapshot validated for this transaction but not yet installed
#[derive(Debug, Default)]
pub struct PendingInstallation {
    snapshot: Option<SyntheticSnapshot>,
    pending: bool,
}

impl PendingInstallation {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `snapshot`, replacing anything staged earlier
    pub fn stage(&mut self, snapshot: SyntheticSnapshot) {
        debug!(
            target: "asof::txn",
            xmin = %snapshot.as_snapshot().xmin,
            xmax = %snapshot.as_snapshot().xmax,
            replaced = self.pending,
            "Staged synthetic snapshot"
        );
        self.snapshot = Some(snapshot);
        self.pending = true;
    }

    /// Discard any staged snapshot
    pub fn clear(&mut self) {
        if self.pending {
            debug!(target: "asof::txn", "Discarded staged synthetic snapshot");
        }
        self.snapshot = None;
        self.pending = false;
    }

    /// Remove the staged snapshot for installation
    pub fn take(&mut self) -> Option<SyntheticSnapshot> {
        self.pending = false;
        self.snapshot.take()
    }

    /// Returns true if a snapshot is staged
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Transaction callback: clear on every event that ends the transaction
    pub fn on_transaction_event(&mut self, event: XactEvent) {
        if event.ends_transaction() {
            debug!(target: "asof::txn", %event, "Transaction boundary");
            self.clear();
        }
    }
}
