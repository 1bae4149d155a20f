//! Single-call execution under a synthetic snapshot

use crate::common::*;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// ann committed, bob in progress at capture time, cy after capture.
/// Returns the database, a loaded session and the captured snapshot text.
fn history() -> (MemoryDatabase, Session<MemorySession>, String) {
    let db = accounts_db();
    add_account(&db, 1, "ann");

    let mut writer = db.session();
    writer.begin(IsolationLevel::ReadCommitted).unwrap();
    writer
        .insert("accounts", vec![json!(2), json!("bob")])
        .unwrap();

    let session = load(&db);
    let text = current_snapshot_text(&session);

    writer.commit().unwrap();
    add_account(&db, 3, "cy");
    (db, session, text)
}

// ============================================================================
// Results
// ============================================================================

#[test]
fn literal_select() {
    let db = accounts_db();
    let mut s = load(&db);
    let out = s.exec_as_of("100:200:", "SELECT 1 AS a", &json!([])).unwrap();
    assert_eq!(out, json!([{"a": 1}]));
}

#[test]
fn empty_table_returns_empty_array() {
    let db = accounts_db();
    let mut s = load(&db);
    let out = s
        .exec_as_of("1:1:", "SELECT * FROM accounts", &json!(null))
        .unwrap();
    assert_eq!(out, json!([]));
}

#[test]
fn sees_only_what_the_snapshot_saw() {
    let (_db, mut s, text) = history();

    let then = s.exec_as_of(&text, "SELECT owner FROM accounts", &json!([])).unwrap();
    assert_eq!(then, json!([{"owner": "ann"}]));

    assert_eq!(owners(&mut s), vec!["ann", "bob", "cy"]);
}

#[test]
fn in_progress_ids_and_ids_past_xmax_are_invisible() {
    let db = accounts_db();
    let first = add_account(&db, 1, "ann");
    let second = add_account(&db, 2, "bob");
    let third = add_account(&db, 3, "cy");
    let mut s = load(&db);

    // bob's transaction listed as running, cy's at xmax
    let text = format!("{}:{}:{}", first, third, second);
    let out = s.exec_as_of(&text, "SELECT id FROM accounts", &json!([])).unwrap();
    assert_eq!(out, json!([{"id": 1}]));

    // everything finished before xmin
    let text = format!("{}:{}:", third.next(), third.next());
    let out = s.exec_as_of(&text, "SELECT id FROM accounts", &json!([])).unwrap();
    assert_eq!(out, json!([{"id": 1}, {"id": 2}, {"id": 3}]));
}

#[test]
fn with_query_is_accepted() {
    let (_db, mut s, text) = history();
    let out = s
        .exec_as_of(
            &text,
            "  WITH a AS (SELECT * FROM accounts) SELECT owner FROM a",
            &json!([]),
        )
        .unwrap();
    assert_eq!(out, json!([{"owner": "ann"}]));
}

// ============================================================================
// Arguments
// ============================================================================

#[test]
fn text_and_number_arguments_bind() {
    let db = accounts_db();
    add_account(&db, 1, "ann");
    add_account(&db, 2, "bob");
    let mut s = load(&db);
    let text = current_snapshot_text(&s);

    let out = s
        .exec_as_of(&text, "SELECT id FROM accounts WHERE owner = $1", &json!(["bob"]))
        .unwrap();
    assert_eq!(out, json!([{"id": 2}]));

    let out = s
        .exec_as_of(&text, "SELECT owner FROM accounts WHERE id = $1", &json!([1]))
        .unwrap();
    assert_eq!(out, json!([{"owner": "ann"}]));
}

#[test]
fn null_argument_matches_nothing() {
    let db = accounts_db();
    add_account(&db, 1, "ann");
    let mut s = load(&db);
    let text = current_snapshot_text(&s);
    let out = s
        .exec_as_of(&text, "SELECT * FROM accounts WHERE owner = $1", &json!([null]))
        .unwrap();
    assert_eq!(out, json!([]));
}

#[test]
fn object_arguments_rejected() {
    let db = accounts_db();
    let mut s = load(&db);
    let err = s
        .exec_as_of("1:1:", "SELECT 1", &json!({"owner": "ann"}))
        .unwrap_err();
    assert!(matches!(err, AsOfError::InvalidArgument { .. }));
    assert_eq!(err.sqlstate(), "22023");
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn write_rejected_without_touching_host() {
    let db = accounts_db();
    let mut s = load(&db);
    let err = s
        .exec_as_of("100:200:", "UPDATE t SET x=1", &json!([]))
        .unwrap_err();
    assert!(matches!(err, AsOfError::UnsupportedQuery { .. }));
    assert_eq!(err.hint(), Some("The query must start with SELECT or WITH"));
    assert!(!s.host().is_connected());
    assert!(s.host().active_snapshot().is_none());
}

#[test]
fn malformed_snapshot_rejected() {
    let db = accounts_db();
    let mut s = load(&db);
    for text in ["", "abc:200:", "100::", "100:200:150:extra", "100:90:", "100:200:250"] {
        let err = s.exec_as_of(text, "SELECT 1", &json!([])).unwrap_err();
        assert!(matches!(err, AsOfError::MalformedSnapshot { .. }), "{:?}", text);
    }
}

#[test]
fn unknown_table_is_internal_error() {
    let db = accounts_db();
    let mut s = load(&db);
    let err = s
        .exec_as_of("1:1:", "SELECT * FROM missing", &json!([]))
        .unwrap_err();
    assert!(matches!(err, AsOfError::Internal { .. }));
    assert!(err.to_string().contains("missing"));
}

// ============================================================================
// Restoration
// ============================================================================

#[test]
fn host_error_restores_active_snapshot() {
    let db = accounts_db();
    let mut s = load(&db);
    s.host_mut().inject_fault(Fault::Error("disk on fire".to_string()));

    let err = s.exec_as_of("1:1:", "SELECT 1", &json!([])).unwrap_err();
    assert_eq!(err, AsOfError::internal("disk on fire"));
    assert!(s.host().active_snapshot().is_none());
    assert!(!s.host().is_connected());
}

#[test]
fn panic_restores_active_snapshot() {
    let db = accounts_db();
    let mut s = load(&db);
    s.host_mut().inject_fault(Fault::Panic("executor crashed".to_string()));

    let result = catch_unwind(AssertUnwindSafe(|| {
        s.exec_as_of("1:1:", "SELECT 1", &json!([]))
    }));
    assert!(result.is_err());
    assert!(s.host().active_snapshot().is_none());
    assert!(!s.host().is_connected());

    // the session is still usable
    let out = s.exec_as_of("1:1:", "SELECT 2 AS b", &json!([])).unwrap();
    assert_eq!(out, json!([{"b": 2}]));
}

#[test]
fn outer_active_snapshot_survives() {
    let db = accounts_db();
    let mut s = load(&db);
    let outer = s.host().capture_snapshot().unwrap();
    s.host_mut().push_active_snapshot(outer);

    s.exec_as_of("1:1:", "SELECT 1", &json!([])).unwrap();
    let top = s.host().active_snapshot().unwrap();
    assert_eq!(top.active_count, 1);
    assert!(!top.copied);
}

// ============================================================================
// Interplay with the transaction
// ============================================================================

#[test]
fn works_without_transaction_block() {
    let (_db, mut s, text) = history();
    assert!(!s.host().in_block());
    assert!(s.exec_as_of(&text, "SELECT 1", &json!([])).is_ok());
}

#[test]
fn works_in_read_committed_and_subtransactions() {
    let (_db, mut s, text) = history();
    begin(&mut s, IsolationLevel::ReadCommitted);
    s.host_mut().savepoint().unwrap();
    let out = s.exec_as_of(&text, "SELECT owner FROM accounts", &json!([])).unwrap();
    assert_eq!(out, json!([{"owner": "ann"}]));
}

#[test]
fn counts_as_first_query_of_repeatable_read() {
    let (_db, mut s, text) = history();
    begin(&mut s, IsolationLevel::RepeatableRead);
    s.exec_as_of(&text, "SELECT 1", &json!([])).unwrap();
    assert!(s.host().first_snapshot_set());
    assert_eq!(
        s.set_snapshot_variable(&text).unwrap_err(),
        AsOfError::SnapshotAlreadyFixed
    );
}
