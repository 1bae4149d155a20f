//! Boundary events, hook registration and per-session state

use crate::common::*;

fn staged() -> (MemoryDatabase, Session<MemorySession>) {
    let db = accounts_db();
    add_account(&db, 1, "ann");
    let mut s = load(&db);
    let text = current_snapshot_text(&s);
    add_account(&db, 2, "bob");

    begin(&mut s, IsolationLevel::RepeatableRead);
    s.set_snapshot_variable(&text).unwrap();
    assert!(s.is_pending());
    (db, s)
}

// ============================================================================
// Boundary events
// ============================================================================

#[test]
fn commit_discards_staged_snapshot() {
    let (_db, mut s) = staged();
    commit(&mut s);
    assert!(!s.is_pending());

    begin(&mut s, IsolationLevel::RepeatableRead);
    assert_eq!(owners(&mut s), vec!["ann", "bob"]);
}

#[test]
fn rollback_discards_staged_snapshot() {
    let (_db, mut s) = staged();
    rollback(&mut s);
    assert!(!s.is_pending());

    begin(&mut s, IsolationLevel::RepeatableRead);
    assert_eq!(owners(&mut s), vec!["ann", "bob"]);
}

#[test]
fn prepare_discards_staged_snapshot() {
    let (_db, mut s) = staged();
    prepare(&mut s);
    assert!(!s.is_pending());
}

#[test]
fn parallel_worker_events_discard() {
    for event in [XactEvent::ParallelCommit, XactEvent::ParallelAbort] {
        let (_db, mut s) = staged();
        s.on_transaction_event(event);
        assert!(!s.is_pending(), "{}", event);
    }
}

#[test]
fn pre_phase_events_keep_staged_snapshot() {
    for event in [
        XactEvent::PreCommit,
        XactEvent::PrePrepare,
        XactEvent::ParallelPreCommit,
    ] {
        let (_db, mut s) = staged();
        s.on_transaction_event(event);
        assert!(s.is_pending(), "{}", event);
        assert_eq!(owners(&mut s), vec!["ann"]);
    }
}

#[test]
fn installed_snapshot_ends_with_transaction() {
    let (_db, mut s) = staged();
    assert_eq!(owners(&mut s), vec!["ann"]);
    rollback(&mut s);

    begin(&mut s, IsolationLevel::RepeatableRead);
    assert!(!s.host().first_snapshot_set());
    assert_eq!(owners(&mut s), vec!["ann", "bob"]);
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn load_registers_both_hooks() {
    let db = accounts_db();
    let s = load(&db);
    assert!(s.host().is_hook_registered(HookKind::QueryStart));
    assert!(s.host().is_hook_registered(HookKind::TransactionCallback));
}

#[test]
fn unload_deregisters_and_returns_host() {
    let (_db, s) = staged();
    let mut host = s.unload();
    assert!(!host.is_hook_registered(HookKind::QueryStart));
    assert!(!host.is_hook_registered(HookKind::TransactionCallback));

    // the host no longer delivers boundary events
    assert!(host.commit().unwrap().is_empty());
}

#[test]
fn reload_starts_clean() {
    let (_db, s) = staged();
    let host = s.unload();
    let s = Session::load(host);
    assert!(!s.is_pending());
    assert_eq!(s.snapshot_variable(), "");
}

// ============================================================================
// Session isolation
// ============================================================================

#[test]
fn staged_state_is_per_session() {
    let (db, mut a) = staged();
    let mut b = load(&db);
    begin(&mut b, IsolationLevel::RepeatableRead);

    assert!(!b.is_pending());
    assert_eq!(owners(&mut b), vec!["ann", "bob"]);
    assert_eq!(owners(&mut a), vec!["ann"]);
}

#[test]
fn sessions_share_the_database() {
    let db = accounts_db();
    let mut a = load(&db);
    let mut b = load(&db);

    begin(&mut a, IsolationLevel::RepeatableRead);
    a.host_mut()
        .insert("accounts", vec![json!(1), json!("ann")])
        .unwrap();
    assert!(owners(&mut b).is_empty());

    commit(&mut a);
    assert_eq!(owners(&mut b), vec!["ann"]);
}
