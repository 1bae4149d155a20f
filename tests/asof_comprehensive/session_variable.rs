//! Installing a snapshot for a whole transaction through the session variable

use crate::common::*;

/// ann committed before the capture, bob committed after it.
fn before_bob() -> (MemoryDatabase, Session<MemorySession>, String) {
    let db = accounts_db();
    add_account(&db, 1, "ann");
    let session = load(&db);
    let text = current_snapshot_text(&session);
    add_account(&db, 2, "bob");
    (db, session, text)
}

#[test]
fn installs_at_first_query() {
    let (_db, mut s, text) = before_bob();
    begin(&mut s, IsolationLevel::RepeatableRead);

    s.set_snapshot_variable(&text).unwrap();
    assert!(s.is_pending());
    assert!(!s.host().first_snapshot_set());

    assert_eq!(owners(&mut s), vec!["ann"]);
    assert!(!s.is_pending());
    assert!(s.host().first_snapshot_set());
}

#[test]
fn installed_snapshot_holds_for_the_transaction() {
    let (db, mut s, text) = before_bob();
    begin(&mut s, IsolationLevel::Serializable);
    s.set_snapshot_variable(&text).unwrap();

    assert_eq!(owners(&mut s), vec!["ann"]);
    add_account(&db, 3, "cy");
    assert_eq!(owners(&mut s), vec!["ann"]);

    commit(&mut s);
    assert_eq!(owners(&mut s), vec!["ann", "bob", "cy"]);
}

#[test]
fn variable_text_survives_but_does_not_reinstall() {
    let (_db, mut s, text) = before_bob();
    begin(&mut s, IsolationLevel::RepeatableRead);
    s.set_snapshot_variable(&text).unwrap();
    assert_eq!(owners(&mut s), vec!["ann"]);
    commit(&mut s);

    assert_eq!(s.snapshot_variable(), text);
    begin(&mut s, IsolationLevel::RepeatableRead);
    assert_eq!(owners(&mut s), vec!["ann", "bob"]);
}

#[test]
fn restaging_replaces_previous_snapshot() {
    let db = accounts_db();
    add_account(&db, 1, "ann");
    let mut s = load(&db);
    let only_ann = current_snapshot_text(&s);
    add_account(&db, 2, "bob");
    let ann_and_bob = current_snapshot_text(&s);
    add_account(&db, 3, "cy");

    begin(&mut s, IsolationLevel::RepeatableRead);
    s.set_snapshot_variable(&only_ann).unwrap();
    s.set_snapshot_variable(&ann_and_bob).unwrap();
    assert_eq!(s.snapshot_variable(), ann_and_bob);
    assert_eq!(owners(&mut s), vec!["ann", "bob"]);
}

#[test]
fn empty_value_clears_pending() {
    let (_db, mut s, text) = before_bob();
    begin(&mut s, IsolationLevel::RepeatableRead);
    s.set_snapshot_variable(&text).unwrap();

    s.set_snapshot_variable("").unwrap();
    assert!(!s.is_pending());
    assert_eq!(s.snapshot_variable(), "");
    assert_eq!(owners(&mut s), vec!["ann", "bob"]);
}

#[test]
fn failed_set_keeps_previous_value() {
    let (_db, mut s, text) = before_bob();
    begin(&mut s, IsolationLevel::RepeatableRead);
    s.set_snapshot_variable(&text).unwrap();

    let err = s.set_snapshot_variable("100:90:").unwrap_err();
    assert!(matches!(err, AsOfError::MalformedSnapshot { .. }));
    assert_eq!(s.snapshot_variable(), text);
    assert!(s.is_pending());
    assert_eq!(owners(&mut s), vec!["ann"]);
}

#[test]
fn in_progress_writer_hidden_after_install() {
    let db = accounts_db();
    add_account(&db, 1, "ann");
    let mut writer = db.session();
    writer.begin(IsolationLevel::ReadCommitted).unwrap();
    writer
        .insert("accounts", vec![json!(2), json!("bob")])
        .unwrap();

    let mut s = load(&db);
    let text = current_snapshot_text(&s);
    writer.commit().unwrap();

    begin(&mut s, IsolationLevel::RepeatableRead);
    s.set_snapshot_variable(&text).unwrap();
    assert_eq!(owners(&mut s), vec!["ann"]);
}

#[test]
fn set_and_show_by_name() {
    let (_db, mut s, text) = before_bob();
    begin(&mut s, IsolationLevel::RepeatableRead);

    s.set("asof.snapshot", &text).unwrap();
    assert_eq!(s.show("ASOF.SNAPSHOT").unwrap(), text);

    let err = s.set("asof.other", &text).unwrap_err();
    assert!(matches!(err, AsOfError::InvalidArgument { .. }));
    assert!(s.show("work_mem").is_err());
}

#[test]
fn query_start_without_staged_snapshot_is_noop() {
    let (_db, mut s, _text) = before_bob();
    begin(&mut s, IsolationLevel::RepeatableRead);
    s.on_query_start().unwrap();
    assert!(!s.host().first_snapshot_set());
}

#[test]
fn exec_as_of_installs_staged_snapshot_first() {
    let (_db, mut s, before) = before_bob();
    let now = current_snapshot_text(&s);
    begin(&mut s, IsolationLevel::RepeatableRead);
    s.set_snapshot_variable(&before).unwrap();

    let out = s
        .exec_as_of(&now, "SELECT owner FROM accounts", &json!([]))
        .unwrap();
    assert_eq!(out, json!([{"owner": "ann"}, {"owner": "bob"}]));
    assert!(!s.is_pending());
    assert!(s.host().first_snapshot_set());

    assert_eq!(owners(&mut s), vec!["ann"]);
}
