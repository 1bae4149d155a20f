//! Single-call execution under a synthetic snapshot
//!
//! [`exec_as_of`] runs one read-only query with a synthetic snapshot pushed
//! as the active snapshot. The snapshot is popped and the connection closed
//! on every exit path by [`ScopedSnapshot`]'s `Drop`, including a panic
//! unwinding out of the host.

use crate::args::json_to_params;
use crate::query::{ensure_read_only, wrap_query};
use asof_concurrency::build;
use asof_core::{
    AsOfError, ExecStatus, HostEngine, QueryRunner, Result, SnapshotDescriptor, SnapshotStack,
    VisibilitySnapshot, DEFAULT_MAX_IN_PROGRESS,
};
use serde_json::Value as JsonValue;
use tracing::debug;

/// An open connection with a snapshot pushed on the active stack.
///
/// Dropping the guard pops the snapshot, then closes the connection.
pub struct ScopedSnapshot<'h, H: QueryRunner + SnapshotStack + ?Sized> {
    host: &'h mut H,
}

impl<'h, H: QueryRunner + SnapshotStack + ?Sized> ScopedSnapshot<'h, H> {
    /// Connect, then push `snapshot` as the active snapshot.
    ///
    /// Nothing is left behind if connecting fails.
    pub fn enter(host: &'h mut H, snapshot: VisibilitySnapshot) -> Result<Self> {
        host.connect()?;
        debug!(
            target: "asof::exec",
            xmin = %snapshot.xmin,
            xmax = %snapshot.xmax,
            xcnt = snapshot.xcnt(),
            "Pushing synthetic snapshot"
        );
        host.push_active_snapshot(snapshot);
        Ok(ScopedSnapshot { host })
    }

    /// The host, for running statements under the pushed snapshot
    pub fn host(&mut self) -> &mut H {
        &mut *self.host
    }
}

impl<'h, H: QueryRunner + SnapshotStack + ?Sized> Drop for ScopedSnapshot<'h, H> {
    fn drop(&mut self) {
        self.host.pop_active_snapshot();
        self.host.finish();
        debug!(target: "asof::exec", "Restored active snapshot");
    }
}

/// Run `sql` with `args` as of the snapshot described by `snapshot_text`.
///
/// Returns the result rows as a JSON array of objects, `[]` when there are
/// none. No transaction-block guardrails apply: the snapshot is active only
/// for this one call.
pub fn exec_as_of<H: HostEngine + ?Sized>(
    host: &mut H,
    snapshot_text: &str,
    sql: &str,
    args: &JsonValue,
) -> Result<JsonValue> {
    exec_as_of_bounded(host, snapshot_text, sql, args, DEFAULT_MAX_IN_PROGRESS)
}

/// [`exec_as_of`] with an explicit limit on in-progress ids
pub fn exec_as_of_bounded<H: HostEngine + ?Sized>(
    host: &mut H,
    snapshot_text: &str,
    sql: &str,
    args: &JsonValue,
    max_in_progress: usize,
) -> Result<JsonValue> {
    ensure_read_only(sql)?;
    let params = json_to_params(args)?;

    let descriptor = SnapshotDescriptor::parse_bounded(snapshot_text, max_in_progress)?;
    let base = host.transaction_snapshot();
    let synthetic = build(base.as_ref(), &descriptor)?;

    let wrapped = wrap_query(sql);
    let mut scope = ScopedSnapshot::enter(host, synthetic.into_snapshot())?;
    let outcome = scope.host().execute(&wrapped, &params, true)?;

    if outcome.status != ExecStatus::Select {
        return Err(AsOfError::internal(format!(
            "query execution failed: unexpected status {}",
            outcome.status
        )));
    }
    if outcome.rows.len() != 1 {
        return Err(AsOfError::internal(format!(
            "expected 1 result row, got {}",
            outcome.rows.len()
        )));
    }

    let value = outcome
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .flatten();
    debug!(
        target: "asof::exec",
        snapshot = %descriptor,
        nargs = params.len(),
        "Executed query as of snapshot"
    );

    Ok(match value {
        None | Some(JsonValue::Null) => JsonValue::Array(Vec::new()),
        Some(v) => v,
    })
}
