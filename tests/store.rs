//! Session store integration tests

use std::collections::BTreeSet;

use clinic_intake::state::{Profile, Role, Snapshot};
use clinic_intake::store::SessionStore;
use tempfile::TempDir;

fn open_store(dir: &TempDir, session: &str) -> SessionStore {
    SessionStore::with_session_name(dir.path(), session.to_string()).unwrap()
}

#[test]
fn test_store_creates_data_dir() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("data");
    assert!(!nested.exists());

    let store = SessionStore::new(&nested).unwrap();
    assert!(nested.exists());
    assert!(store.session_name().starts_with("drx-"));
}

#[test]
fn test_turn_log_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0001");

    store.log_session_start().unwrap();
    store.log_turn(Role::User, "سلام، وقت می‌خواهم").unwrap();
    store.log_turn(Role::Assistant, "حتماً، اسمتان چیست؟").unwrap();

    let entries = store.iter_log_entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].role, "session");
    assert_eq!(entries[1].role, "user");
    assert_eq!(entries[1].text, "سلام، وقت می‌خواهم");
    assert_eq!(entries[1].session.as_deref(), Some("drx-test-0001"));
    assert_eq!(entries[2].role, "assistant");
}

#[test]
fn test_multiline_text_is_reassembled() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0002");

    store
        .log_turn(Role::Assistant, "line one\nline two\nline three")
        .unwrap();
    store.log_turn(Role::User, "next turn").unwrap();

    let entries = store.iter_log_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "line one\nline two\nline three");
    assert_eq!(entries[1].text, "next turn");
}

#[test]
fn test_history_restores_tail_of_log() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0003");

    store.log_session_start().unwrap();
    for i in 0..10 {
        store.log_turn(Role::User, &format!("question {i}")).unwrap();
        store
            .log_turn(Role::Assistant, &format!("answer {i}"))
            .unwrap();
    }

    let history = store.load_history(4);
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].text, "question 8");
    assert_eq!(history[3].text, "answer 9");
    // The session-start line is not a conversation turn
    assert!(history.iter().all(|t| !t.text.contains("started at")));
}

#[test]
fn test_snapshot_round_trip_and_overwrite() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0004");

    assert!(store.load_last_snapshot().is_none());

    let first = Snapshot {
        session: "drx-test-0004".to_string(),
        profile: Profile {
            name: Some("مریم".to_string()),
            address: None,
        },
        notes: vec![],
    };
    store.save_snapshot(&first).unwrap();

    let second = Snapshot {
        session: "drx-test-0004".to_string(),
        profile: Profile {
            name: Some("مریم".to_string()),
            address: Some("تهران، خیابان انقلاب".to_string()),
        },
        notes: vec!["شنبه ساعت ده".to_string()],
    };
    store.save_snapshot(&second).unwrap();

    // Latest wins
    let loaded = store.load_last_snapshot().unwrap();
    assert_eq!(loaded.profile.address.as_deref(), Some("تهران، خیابان انقلاب"));
    assert_eq!(loaded.notes, vec!["شنبه ساعت ده".to_string()]);
}

#[test]
fn test_corrupt_snapshot_is_ignored() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0005");

    std::fs::write(store.snapshot_path(), "{not valid json").unwrap();
    assert!(store.load_last_snapshot().is_none());
}

#[test]
fn test_known_clients_from_file() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0006");

    let mut names = BTreeSet::new();
    names.insert("رضا".to_string());
    names.insert("سارا".to_string());
    store.persist_known_clients(&names).unwrap();

    let reopened = open_store(&dir, "drx-test-0007");
    let loaded = reopened.load_known_clients();
    assert_eq!(loaded, names);
}

#[test]
fn test_known_clients_recovered_from_log() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0008");

    // No clients.json; assistant entries carrying JSON names are scraped
    store
        .log_turn(
            Role::Assistant,
            r#"{"reply": "ثبت شد", "name": "فرهاد", "address": null}"#,
        )
        .unwrap();
    store
        .log_turn(Role::Assistant, "a plain reply with no payload")
        .unwrap();
    store
        .log_turn(Role::User, r#"{"name": "باید نادیده گرفته شود"}"#)
        .unwrap();

    let loaded = store.load_known_clients();
    assert_eq!(loaded.len(), 1);
    assert!(loaded.contains("فرهاد"));
}

#[test]
fn test_custom_prompt_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0009");

    assert!(store.load_custom_prompt().is_none());

    store.save_custom_prompt("  Always answer briefly.  ").unwrap();
    assert_eq!(
        store.load_custom_prompt().as_deref(),
        Some("Always answer briefly.")
    );

    // Whitespace-only prompt does not override the default
    store.save_custom_prompt("   ").unwrap();
    assert!(store.load_custom_prompt().is_none());
}

#[test]
fn test_name_list_fallback_and_file() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0010");

    // Built-in fallback applies when names.txt is absent
    let fallback = store.load_name_list();
    assert!(fallback.contains("مریم"));

    std::fs::write(dir.path().join("names.txt"), "آیدا\n\n  بهرام  \n").unwrap();
    let from_file = store.load_name_list();
    assert_eq!(from_file.len(), 2);
    assert!(from_file.contains("آیدا"));
    assert!(from_file.contains("بهرام"));
}

#[test]
fn test_session_meta_written() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, "drx-test-0011");
    store.save_session_meta().unwrap();

    let text = std::fs::read_to_string(dir.path().join("session_meta.json")).unwrap();
    let meta: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(meta["session_name"], "drx-test-0011");
    assert!(meta["started_at"].as_str().unwrap().contains('T'));
}
