//! Shared in-memory heap
//!
//! Every tuple carries the id of the transaction that created it (`xmin`)
//! and, once deleted, the id of the deleting transaction (`xmax`). A commit
//! log records the fate of each id. Whether a tuple is visible is decided
//! per snapshot, the same way the host engine does it.

use crate::session::MemorySession;
use asof_core::{HostError, TxnId, VisibilitySnapshot};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Fate of a transaction id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XidStatus {
    /// Still running (or prepared)
    InProgress,
    /// Committed
    Committed,
    /// Rolled back
    Aborted,
}

/// One row version
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    /// Creating transaction
    pub xmin: TxnId,
    /// Deleting transaction, if any
    pub xmax: Option<TxnId>,
    /// Column values in table order
    pub values: Vec<JsonValue>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub(crate) columns: Vec<String>,
    pub(crate) tuples: Vec<Tuple>,
}

#[derive(Debug)]
struct DbState {
    next_xid: TxnId,
    clog: BTreeMap<TxnId, XidStatus>,
    tables: HashMap<String, Table>,
}

impl DbState {
    fn status(&self, xid: TxnId) -> Option<XidStatus> {
        self.clog.get(&xid).copied()
    }

    fn xid_visible(&self, xid: TxnId, snapshot: &VisibilitySnapshot, own: Option<TxnId>) -> bool {
        if own == Some(xid) {
            return true;
        }
        self.status(xid) == Some(XidStatus::Committed) && snapshot.sees_committed(xid)
    }

    fn tuple_visible(
        &self,
        tuple: &Tuple,
        snapshot: &VisibilitySnapshot,
        own: Option<TxnId>,
    ) -> bool {
        if !self.xid_visible(tuple.xmin, snapshot, own) {
            return false;
        }
        match tuple.xmax {
            Some(deleter) => !self.xid_visible(deleter, snapshot, own),
            None => true,
        }
    }

    fn table(&self, name: &str) -> Result<&Table, HostError> {
        self.tables
            .get(name)
            .ok_or_else(|| HostError::new(format!("relation \"{}\" does not exist", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, HostError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| HostError::new(format!("relation \"{}\" does not exist", name)))
    }
}

/// Database shared by any number of [`MemorySession`]s
///
/// Cloning is cheap; clones refer to the same heap.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    inner: Arc<RwLock<DbState>>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// Create an empty database. The first id handed out is
    /// [`TxnId::FIRST_NORMAL`].
    pub fn new() -> Self {
        MemoryDatabase {
            inner: Arc::new(RwLock::new(DbState {
                next_xid: TxnId::FIRST_NORMAL,
                clog: BTreeMap::new(),
                tables: HashMap::new(),
            })),
        }
    }

    /// Open a new session on this database
    pub fn session(&self) -> MemorySession {
        MemorySession::new(self.clone())
    }

    /// Create table `name` with the given column names
    pub fn create_table(&self, name: &str, columns: &[&str]) -> Result<(), HostError> {
        let name = name.to_ascii_lowercase();
        let mut state = self.inner.write();
        if state.tables.contains_key(&name) {
            return Err(HostError::new(format!("relation \"{}\" already exists", name)));
        }
        state.tables.insert(
            name,
            Table {
                columns: columns.iter().map(|c| c.to_ascii_lowercase()).collect(),
                tuples: Vec::new(),
            },
        );
        Ok(())
    }

    /// Next id that will be assigned
    pub fn next_xid(&self) -> TxnId {
        self.inner.read().next_xid
    }

    /// Recorded fate of `xid`, `None` if it was never assigned
    pub fn xid_status(&self, xid: TxnId) -> Option<XidStatus> {
        self.inner.read().status(xid)
    }

    /// Every tuple of `table`, visible or not
    pub fn raw_tuples(&self, table: &str) -> Result<Vec<Tuple>, HostError> {
        Ok(self.inner.read().table(table)?.tuples.clone())
    }

    pub(crate) fn assign_xid(&self) -> TxnId {
        let mut state = self.inner.write();
        let xid = state.next_xid;
        state.next_xid = xid.next();
        state.clog.insert(xid, XidStatus::InProgress);
        debug!(target: "asof::engine", %xid, "Assigned transaction id");
        xid
    }

    pub(crate) fn finish_xid(&self, xid: TxnId, committed: bool) {
        let status = if committed {
            XidStatus::Committed
        } else {
            XidStatus::Aborted
        };
        self.inner.write().clog.insert(xid, status);
        debug!(target: "asof::engine", %xid, ?status, "Finished transaction id");
    }

    /// Snapshot of the current state as seen by a transaction owning `own`.
    ///
    /// `own` is left out of the in-progress list; the session sees its own
    /// changes through the `own` check instead.
    pub(crate) fn capture(&self, own: Option<TxnId>) -> VisibilitySnapshot {
        let state = self.inner.read();
        let xmax = state.next_xid;
        let running: Vec<TxnId> = state
            .clog
            .iter()
            .filter(|(_, status)| **status == XidStatus::InProgress)
            .map(|(xid, _)| *xid)
            .collect();
        let xmin = running.first().copied().unwrap_or(xmax);
        let xip = running.into_iter().filter(|xid| Some(*xid) != own).collect();
        VisibilitySnapshot::new(xmin, xmax, xip)
    }

    pub(crate) fn insert(
        &self,
        table: &str,
        xid: TxnId,
        values: Vec<JsonValue>,
    ) -> Result<(), HostError> {
        let mut state = self.inner.write();
        let table = state.table_mut(table)?;
        if values.len() != table.columns.len() {
            return Err(HostError::new(format!(
                "INSERT has {} values but the table has {} columns",
                values.len(),
                table.columns.len()
            )));
        }
        table.tuples.push(Tuple {
            xmin: xid,
            xmax: None,
            values,
        });
        Ok(())
    }

    /// Column names and visible rows of `table`
    pub(crate) fn scan(
        &self,
        table: &str,
        snapshot: &VisibilitySnapshot,
        own: Option<TxnId>,
    ) -> Result<(Vec<String>, Vec<Vec<JsonValue>>), HostError> {
        let state = self.inner.read();
        let t = state.table(table)?;
        let rows = t
            .tuples
            .iter()
            .filter(|tuple| state.tuple_visible(tuple, snapshot, own))
            .map(|tuple| tuple.values.clone())
            .collect();
        Ok((t.columns.clone(), rows))
    }

    /// Mark visible tuples whose `column` renders as `value` deleted by `xid`
    pub(crate) fn delete_where(
        &self,
        table: &str,
        column: &str,
        value: &str,
        snapshot: &VisibilitySnapshot,
        xid: TxnId,
    ) -> Result<usize, HostError> {
        let mut guard = self.inner.write();
        let state = &mut *guard;
        let t = state
            .tables
            .get(table)
            .ok_or_else(|| HostError::new(format!("relation \"{}\" does not exist", table)))?;
        let idx = column_index(&t.columns, column)?;

        let targets: Vec<usize> = t
            .tuples
            .iter()
            .enumerate()
            .filter(|(_, tuple)| state.tuple_visible(tuple, snapshot, Some(xid)))
            .filter(|(_, tuple)| value_text(&tuple.values[idx]).as_deref() == Some(value))
            .map(|(i, _)| i)
            .collect();

        let t = state.table_mut(table)?;
        for i in &targets {
            t.tuples[*i].xmax = Some(xid);
        }
        Ok(targets.len())
    }
}

pub(crate) fn column_index(columns: &[String], column: &str) -> Result<usize, HostError> {
    columns
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| HostError::new(format!("column \"{}\" does not exist", column)))
}

/// Text form of a value as a text parameter would compare against it
pub(crate) fn value_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
