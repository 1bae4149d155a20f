//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

pub use asof::{
    AsOfConfig, AsOfError, IsolationLevel, Session, SnapshotDescriptor, TxnId, XactEvent,
};
pub use asof_core::{HookKind, Row, SnapshotStack, TransactionState};
pub use asof_engine::{Fault, MemoryDatabase, MemorySession};
pub use serde_json::{json, Value as JsonValue};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (shown with --nocapture)
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

/// Database with an empty `accounts(id, owner)` table
pub fn accounts_db() -> MemoryDatabase {
    init_tracing();
    let db = MemoryDatabase::new();
    db.create_table("accounts", &["id", "owner"]).unwrap();
    db
}

/// Load a session on a fresh connection to `db`
pub fn load(db: &MemoryDatabase) -> Session<MemorySession> {
    Session::load(db.session())
}

/// Autocommitted insert of one account row
pub fn add_account(db: &MemoryDatabase, id: i64, owner: &str) -> TxnId {
    db.session()
        .insert("accounts", vec![json!(id), json!(owner)])
        .unwrap()
}

/// Export the connection's current snapshot as descriptor text
pub fn current_snapshot_text(session: &Session<MemorySession>) -> String {
    let snapshot = session.host().capture_snapshot().unwrap();
    SnapshotDescriptor::from_snapshot(&snapshot).unwrap().to_string()
}

// ============================================================================
// Host-side drivers: what the engine does around the hooks
// ============================================================================

/// BEGIN at `isolation`
pub fn begin(session: &mut Session<MemorySession>, isolation: IsolationLevel) {
    session.host_mut().begin(isolation).unwrap();
}

/// COMMIT, delivering the boundary events to the session
pub fn commit(session: &mut Session<MemorySession>) {
    let events = session.host_mut().commit().unwrap();
    deliver(session, events);
}

/// ROLLBACK, delivering the boundary events to the session
pub fn rollback(session: &mut Session<MemorySession>) {
    let events = session.host_mut().rollback().unwrap();
    deliver(session, events);
}

/// PREPARE TRANSACTION, delivering the boundary events to the session
pub fn prepare(session: &mut Session<MemorySession>) {
    let events = session.host_mut().prepare().unwrap();
    deliver(session, events);
}

fn deliver(session: &mut Session<MemorySession>, events: Vec<XactEvent>) {
    for event in events {
        session.on_transaction_event(event);
    }
}

/// Run a client query: query-start hook first, then the statement
pub fn query(session: &mut Session<MemorySession>, sql: &str) -> Result<Vec<Row>, AsOfError> {
    session.on_query_start()?;
    Ok(session.host_mut().query(sql, &[])?)
}

/// Owners visible to a client query, sorted
pub fn owners(session: &mut Session<MemorySession>) -> Vec<String> {
    let mut names: Vec<String> = query(session, "SELECT owner FROM accounts")
        .unwrap()
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    names.sort();
    names
}
