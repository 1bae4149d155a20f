//! One connection to a [`MemoryDatabase`]
//!
//! A session behaves like a backend of the host engine: it runs explicit
//! transaction blocks at a chosen isolation level, tracks savepoint nesting,
//! fixes the first snapshot of a repeatable-read transaction, keeps an active
//! snapshot stack and executes the SQL subset described in [`crate::sql`].
//!
//! Transaction boundary methods return the [`XactEvent`]s a registered
//! transaction callback would receive, in order. With no callback
//! registered they return nothing.

use crate::memory::{column_index, value_text, MemoryDatabase};
use crate::sql::{Expr, Projection, Query, Select, Statement};
use asof_core::{
    ExecStatus, HookKind, HookRegistry, HostError, IsolationLevel, QueryOutcome, QueryRunner, Row,
    SnapshotStack, TransactionState, TxnId, VisibilitySnapshot, XactEvent,
};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeSet;
use tracing::debug;

/// Failure injected into the next [`QueryRunner::execute`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Return a host error with this message
    Error(String),
    /// Panic with this message
    Panic(String),
}

/// Intermediate result of evaluating a query
#[derive(Debug, Clone, Default)]
struct Relation {
    columns: Vec<String>,
    rows: Vec<Vec<JsonValue>>,
}

/// A single connection, implementing every host trait
#[derive(Debug)]
pub struct MemorySession {
    db: MemoryDatabase,
    in_block: bool,
    isolation: IsolationLevel,
    nesting: u32,
    xid: Option<TxnId>,
    first_snapshot_set: bool,
    fixed_snapshot: Option<VisibilitySnapshot>,
    active: Vec<VisibilitySnapshot>,
    connected: bool,
    hooks: BTreeSet<HookKind>,
    fault: Option<Fault>,
}

impl MemorySession {
    pub(crate) fn new(db: MemoryDatabase) -> Self {
        MemorySession {
            db,
            in_block: false,
            isolation: IsolationLevel::default(),
            nesting: 1,
            xid: None,
            first_snapshot_set: false,
            fixed_snapshot: None,
            active: Vec::new(),
            connected: false,
            hooks: BTreeSet::new(),
            fault: None,
        }
    }

    /// Database this session is connected to
    pub fn database(&self) -> &MemoryDatabase {
        &self.db
    }

    // ========================================================================
    // Transaction control
    // ========================================================================

    /// `BEGIN ISOLATION LEVEL <isolation>`
    pub fn begin(&mut self, isolation: IsolationLevel) -> Result<(), HostError> {
        if self.in_block {
            return Err(HostError::new("there is already a transaction in progress"));
        }
        self.in_block = true;
        self.isolation = isolation;
        self.nesting = 1;
        debug!(target: "asof::engine", %isolation, "BEGIN");
        Ok(())
    }

    /// `COMMIT`
    pub fn commit(&mut self) -> Result<Vec<XactEvent>, HostError> {
        self.end_block(true)?;
        Ok(self.events(&[XactEvent::PreCommit, XactEvent::Commit]))
    }

    /// `ROLLBACK`
    pub fn rollback(&mut self) -> Result<Vec<XactEvent>, HostError> {
        self.end_block(false)?;
        Ok(self.events(&[XactEvent::Abort]))
    }

    /// `PREPARE TRANSACTION`
    ///
    /// The transaction id stays in progress: prepared transactions are never
    /// resolved by this engine.
    pub fn prepare(&mut self) -> Result<Vec<XactEvent>, HostError> {
        self.require_block()?;
        self.reset_block();
        debug!(target: "asof::engine", "PREPARE TRANSACTION");
        Ok(self.events(&[XactEvent::PrePrepare, XactEvent::Prepare]))
    }

    /// `SAVEPOINT`: enter a subtransaction
    pub fn savepoint(&mut self) -> Result<(), HostError> {
        self.require_block()?;
        self.nesting += 1;
        Ok(())
    }

    /// `RELEASE SAVEPOINT`: leave the innermost subtransaction
    pub fn release_savepoint(&mut self) -> Result<(), HostError> {
        self.require_block()?;
        if self.nesting <= 1 {
            return Err(HostError::new("savepoint does not exist"));
        }
        self.nesting -= 1;
        Ok(())
    }

    /// Returns true inside `BEGIN ... COMMIT`
    pub fn in_block(&self) -> bool {
        self.in_block
    }

    /// Id assigned to the current transaction, if it has written anything
    pub fn current_xid(&self) -> Option<TxnId> {
        self.xid
    }

    /// Returns true while the query-execution connection is open
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns true if `kind` is registered
    pub fn is_hook_registered(&self, kind: HookKind) -> bool {
        self.hooks.contains(&kind)
    }

    /// Make the next [`QueryRunner::execute`] fail with `fault`
    pub fn inject_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    fn require_block(&self) -> Result<(), HostError> {
        if self.in_block {
            Ok(())
        } else {
            Err(HostError::new("there is no transaction in progress"))
        }
    }

    fn end_block(&mut self, committed: bool) -> Result<(), HostError> {
        self.require_block()?;
        if let Some(xid) = self.xid {
            self.db.finish_xid(xid, committed);
        }
        self.reset_block();
        debug!(target: "asof::engine", committed, "End of transaction block");
        Ok(())
    }

    fn reset_block(&mut self) {
        self.in_block = false;
        self.isolation = IsolationLevel::default();
        self.nesting = 1;
        self.xid = None;
        self.first_snapshot_set = false;
        self.fixed_snapshot = None;
    }

    fn events(&self, events: &[XactEvent]) -> Vec<XactEvent> {
        if self.is_hook_registered(HookKind::TransactionCallback) {
            events.to_vec()
        } else {
            Vec::new()
        }
    }

    fn statement_snapshot(&mut self) -> Result<VisibilitySnapshot, HostError> {
        if let Some(top) = self.active.last() {
            return Ok(top.clone());
        }
        self.transaction_snapshot()
            .ok_or_else(|| HostError::new("no snapshot available"))
    }

    // ========================================================================
    // Data access
    // ========================================================================

    /// Insert one row into `table`.
    ///
    /// Outside a block the insert commits immediately. Returns the id of the
    /// writing transaction.
    pub fn insert(&mut self, table: &str, values: Vec<JsonValue>) -> Result<TxnId, HostError> {
        let table = table.to_ascii_lowercase();
        if !self.in_block {
            let xid = self.db.assign_xid();
            let result = self.db.insert(&table, xid, values);
            self.db.finish_xid(xid, result.is_ok());
            return result.map(|_| xid);
        }
        let xid = self.ensure_xid();
        self.db.insert(&table, xid, values)?;
        Ok(xid)
    }

    /// Delete visible rows of `table` whose `column` equals `value` as text
    pub fn delete_where(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<usize, HostError> {
        let table = table.to_ascii_lowercase();
        let column = column.to_ascii_lowercase();
        let autocommit = !self.in_block;
        let snapshot = self.statement_snapshot()?;
        let xid = self.ensure_xid();
        let result = self.db.delete_where(&table, &column, value, &snapshot, xid);
        if autocommit {
            self.db.finish_xid(xid, result.is_ok());
            self.xid = None;
        }
        result
    }

    /// Run a client query under the statement snapshot
    pub fn query(&mut self, sql: &str, params: &[Option<String>]) -> Result<Vec<Row>, HostError> {
        Ok(self.run(sql, params, false)?.rows)
    }

    fn ensure_xid(&mut self) -> TxnId {
        match self.xid {
            Some(xid) => xid,
            None => {
                let xid = self.db.assign_xid();
                self.xid = Some(xid);
                xid
            }
        }
    }

    fn run(
        &mut self,
        sql: &str,
        params: &[Option<String>],
        read_only: bool,
    ) -> Result<QueryOutcome, HostError> {
        match Statement::parse(sql)? {
            Statement::Write(verb) | Statement::Utility(verb) if read_only => Err(HostError::new(
                format!("cannot execute {} in a read-only transaction", verb),
            )),
            Statement::Write(verb) | Statement::Utility(verb) => Err(HostError::new(format!(
                "{} is not supported by the in-memory engine",
                verb
            ))),
            Statement::Query(query) => {
                let snapshot = self.statement_snapshot()?;
                let relation = self.evaluate(&query, &snapshot, params, &mut Vec::new())?;
                let rows = relation
                    .rows
                    .into_iter()
                    .map(|row| row.into_iter().map(non_null).collect())
                    .collect();
                Ok(QueryOutcome {
                    status: ExecStatus::Select,
                    rows,
                })
            }
            Statement::JsonAgg(query) => {
                let snapshot = self.statement_snapshot()?;
                let relation = self.evaluate(&query, &snapshot, params, &mut Vec::new())?;
                let objects: Vec<JsonValue> = relation
                    .rows
                    .into_iter()
                    .map(|row| {
                        let object: Map<String, JsonValue> =
                            relation.columns.iter().cloned().zip(row).collect();
                        JsonValue::Object(object)
                    })
                    .collect();
                Ok(QueryOutcome {
                    status: ExecStatus::Select,
                    rows: vec![vec![Some(JsonValue::Array(objects))]],
                })
            }
        }
    }

    fn evaluate(
        &self,
        query: &Query,
        snapshot: &VisibilitySnapshot,
        params: &[Option<String>],
        ctes: &mut Vec<(String, Relation)>,
    ) -> Result<Relation, HostError> {
        match query {
            Query::With { name, body, then } => {
                let bound = self.evaluate(body, snapshot, params, ctes)?;
                ctes.push((name.clone(), bound));
                let result = self.evaluate(then, snapshot, params, ctes);
                ctes.pop();
                result
            }
            Query::Select(select) => self.evaluate_select(select, snapshot, params, ctes),
        }
    }

    fn evaluate_select(
        &self,
        select: &Select,
        snapshot: &VisibilitySnapshot,
        params: &[Option<String>],
        ctes: &[(String, Relation)],
    ) -> Result<Relation, HostError> {
        let source = match &select.from {
            Some(name) => match ctes.iter().rev().find(|(n, _)| n == name) {
                Some((_, relation)) => relation.clone(),
                None => {
                    let (columns, rows) = self.db.scan(name, snapshot, self.xid)?;
                    Relation { columns, rows }
                }
            },
            None => Relation {
                columns: Vec::new(),
                rows: vec![Vec::new()],
            },
        };

        let mut rows = source.rows;
        if let Some((column, expr)) = &select.filter {
            let idx = column_index(&source.columns, column)?;
            let wanted = value_text(&resolve(expr, &source.columns, &[], params)?);
            rows.retain(|row| wanted.is_some() && value_text(&row[idx]) == wanted);
        }

        match &select.projection {
            Projection::Star => Ok(Relation {
                columns: source.columns,
                rows,
            }),
            Projection::Items(items) => {
                let columns = items.iter().map(|(_, name)| name.clone()).collect();
                let rows = rows
                    .iter()
                    .map(|row| {
                        items
                            .iter()
                            .map(|(expr, _)| resolve(expr, &source.columns, row, params))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Relation { columns, rows })
            }
        }
    }
}

fn resolve(
    expr: &Expr,
    columns: &[String],
    row: &[JsonValue],
    params: &[Option<String>],
) -> Result<JsonValue, HostError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Param(n) => match params.get(n - 1) {
            Some(Some(text)) => Ok(JsonValue::String(text.clone())),
            Some(None) => Ok(JsonValue::Null),
            None => Err(HostError::new(format!("there is no parameter ${}", n))),
        },
        Expr::Column(name) => {
            let idx = column_index(columns, name)?;
            row.get(idx)
                .cloned()
                .ok_or_else(|| HostError::new(format!("column \"{}\" does not exist", name)))
        }
    }
}

fn non_null(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Null => None,
        v => Some(v),
    }
}

impl TransactionState for MemorySession {
    fn in_transaction_block(&self) -> bool {
        self.in_block
    }

    fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    fn nesting_level(&self) -> u32 {
        self.nesting
    }

    fn first_snapshot_set(&self) -> bool {
        self.first_snapshot_set
    }

    fn capture_snapshot(&self) -> Option<VisibilitySnapshot> {
        Some(self.db.capture(self.xid))
    }

    fn transaction_snapshot(&mut self) -> Option<VisibilitySnapshot> {
        if !self.in_block {
            return self.capture_snapshot();
        }
        if let Some(fixed) = &self.fixed_snapshot {
            return Some(fixed.clone());
        }
        let snapshot = self.capture_snapshot()?;
        if self.isolation.uses_transaction_snapshot() {
            self.fixed_snapshot = Some(snapshot.clone());
        }
        self.first_snapshot_set = true;
        Some(snapshot)
    }

    fn install_transaction_snapshot(
        &mut self,
        snapshot: VisibilitySnapshot,
    ) -> Result<(), HostError> {
        self.require_block()?;
        if self.fixed_snapshot.is_some() {
            return Err(HostError::new("transaction snapshot is already set"));
        }
        debug!(
            target: "asof::engine",
            xmin = %snapshot.xmin,
            xmax = %snapshot.xmax,
            "Installed transaction snapshot"
        );
        self.fixed_snapshot = Some(snapshot);
        self.first_snapshot_set = true;
        Ok(())
    }
}

impl SnapshotStack for MemorySession {
    fn push_active_snapshot(&mut self, mut snapshot: VisibilitySnapshot) {
        snapshot.active_count += 1;
        self.active.push(snapshot);
    }

    fn pop_active_snapshot(&mut self) -> Option<VisibilitySnapshot> {
        self.active.pop().map(|mut snapshot| {
            snapshot.active_count = snapshot.active_count.saturating_sub(1);
            snapshot
        })
    }

    fn active_snapshot(&self) -> Option<&VisibilitySnapshot> {
        self.active.last()
    }
}

impl QueryRunner for MemorySession {
    fn connect(&mut self) -> Result<(), HostError> {
        if self.connected {
            return Err(HostError::new("query runner is already connected"));
        }
        self.connected = true;
        Ok(())
    }

    fn execute(
        &mut self,
        sql: &str,
        params: &[Option<String>],
        read_only: bool,
    ) -> Result<QueryOutcome, HostError> {
        if !self.connected {
            return Err(HostError::new("query runner is not connected"));
        }
        match self.fault.take() {
            Some(Fault::Error(message)) => return Err(HostError::new(message)),
            Some(Fault::Panic(message)) => panic!("{}", message),
            None => {}
        }
        self.run(sql, params, read_only)
    }

    fn finish(&mut self) {
        self.connected = false;
    }
}

impl HookRegistry for MemorySession {
    fn register_hook(&mut self, kind: HookKind) {
        self.hooks.insert(kind);
    }

    fn unregister_hook(&mut self, kind: HookKind) {
        self.hooks.remove(&kind);
    }
}
