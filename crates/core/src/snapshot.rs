//! Visibility snapshots as the host engine issues them
//!
//! A [`VisibilitySnapshot`] decides which row versions a query sees:
//! - ids `< xmin` finished before the snapshot and are visible if committed
//! - ids `>= xmax` had not started and are never visible
//! - ids listed in `xip` (or `subxip`) were still running and are invisible
//!
//! `xip` and `subxip` are kept sorted so the in-progress test is a binary
//! search.

use crate::types::{CommandId, TxnId};
use serde::{Deserialize, Serialize};

/// Engine-issued MVCC snapshot.
///
/// Owned by the host. The core only ever copies it (see the synthetic
/// snapshot builder); fields other than the visibility bounds are carried
/// through opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilitySnapshot {
    /// All ids below this are finished
    pub xmin: TxnId,
    /// All ids at or above this had not started
    pub xmax: TxnId,
    /// In-progress top-level ids, sorted ascending
    pub xip: Vec<TxnId>,
    /// In-progress subtransaction ids, sorted ascending
    pub subxip: Vec<TxnId>,
    /// The subtransaction list overflowed and is incomplete
    pub suboverflowed: bool,
    /// Snapshot was taken on a standby during recovery
    pub taken_during_recovery: bool,
    /// Snapshot is a private copy rather than the host's static one
    pub copied: bool,
    /// Command id of the snapshot's own transaction
    pub curcid: CommandId,
    /// Times this snapshot sits on the active stack
    pub active_count: u32,
    /// Times this snapshot is registered with the host
    pub regd_count: u32,
}

impl VisibilitySnapshot {
    /// Create a snapshot with the given bounds and no subtransaction data.
    ///
    /// `xip` is sorted and deduplicated.
    pub fn new(xmin: TxnId, xmax: TxnId, mut xip: Vec<TxnId>) -> Self {
        xip.sort_unstable();
        xip.dedup();
        VisibilitySnapshot {
            xmin,
            xmax,
            xip,
            subxip: Vec::new(),
            suboverflowed: false,
            taken_during_recovery: false,
            copied: false,
            curcid: CommandId::default(),
            active_count: 0,
            regd_count: 0,
        }
    }

    /// Number of in-progress top-level ids
    pub fn xcnt(&self) -> usize {
        self.xip.len()
    }

    /// Returns true if `xid` counts as still running for this snapshot.
    ///
    /// A running transaction's effects are invisible. Ids at or above `xmax`
    /// are treated as running.
    pub fn xid_in_progress(&self, xid: TxnId) -> bool {
        if xid < self.xmin {
            return false;
        }
        if xid >= self.xmax {
            return true;
        }
        if self.xip.binary_search(&xid).is_ok() {
            return true;
        }
        !self.suboverflowed && self.subxip.binary_search(&xid).is_ok()
    }

    /// Returns true if the effects of a committed `xid` are visible.
    pub fn sees_committed(&self, xid: TxnId) -> bool {
        !self.xid_in_progress(xid)
    }
}
