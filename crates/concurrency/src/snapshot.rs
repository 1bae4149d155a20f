//! Synthetic snapshot construction
//!
//! A [`SyntheticSnapshot`] is a private copy of a host-issued base snapshot
//! whose visibility bounds come from a parsed [`SnapshotDescriptor`]:
//!
//! - `xmin`, `xmax`, `xip` are replaced by the descriptor's values
//! - the subtransaction list is forced empty and marked not overflowed
//! - the copy is marked `copied` with zero active/registered counts, since
//!   it is not registered anywhere else
//!
//! Every other base field (command id, recovery flag) is carried through.
//!
//! # Ownership
//!
//! The value has exactly one owner at a time. It is moved into either the
//! session's pending installation slot (dropped at transaction end) or the
//! scoped executor's guard (dropped when the call returns). It is never
//! shared.

use asof_core::{AsOfError, Result, SnapshotDescriptor, VisibilitySnapshot};
use tracing::debug;

/// A snapshot whose bounds were supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticSnapshot {
    inner: VisibilitySnapshot,
}

impl SyntheticSnapshot {
    /// Borrow the snapshot in the host's representation
    pub fn as_snapshot(&self) -> &VisibilitySnapshot {
        &self.inner
    }

    /// Hand the snapshot to the host
    pub fn into_snapshot(self) -> VisibilitySnapshot {
        self.inner
    }
}

/// Overlay `descriptor` onto a copy of `base`.
///
/// # Errors
///
/// Returns `Internal` if `base` is absent. Callers that ran the guardrail
/// first always have a base.
pub fn build(
    base: Option<&VisibilitySnapshot>,
    descriptor: &SnapshotDescriptor,
) -> Result<SyntheticSnapshot> {
    let base = base.ok_or_else(|| AsOfError::internal("no base snapshot to overlay"))?;

    let mut inner = base.clone();
    inner.xmin = descriptor.xmin();
    inner.xmax = descriptor.xmax();
    inner.xip = descriptor.xip().to_vec();
    inner.subxip = Vec::new();
    inner.suboverflowed = false;
    inner.copied = true;
    inner.active_count = 0;
    inner.regd_count = 0;

    debug!(
        target: "asof::snapshot",
        xmin = %inner.xmin,
        xmax = %inner.xmax,
        xcnt = inner.xip.len(),
        "Built synthetic snapshot"
    );

    Ok(SyntheticSnapshot { inner })
}
