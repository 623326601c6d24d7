//! Dialogue parsing and prompt assembly tests

use clinic_intake::state::{History, Profile, Role, Snapshot};
use clinic_intake::{TurnContext, build_turn_prompt, parse_payload};

#[test]
fn test_structured_reply_extraction() {
    let payload = parse_payload(
        r#"{"reply": "سلام مریم جان", "name": "مریم", "address": "اصفهان", "notes": "سردرد مزمن"}"#,
    );
    assert_eq!(payload.reply, "سلام مریم جان");
    assert_eq!(payload.name.as_deref(), Some("مریم"));
    assert_eq!(payload.address.as_deref(), Some("اصفهان"));
    assert_eq!(payload.note.as_deref(), Some("سردرد مزمن"));
}

#[test]
fn test_unparseable_reply_spoken_verbatim() {
    let raw = "Sorry, something went wrong upstream";
    let payload = parse_payload(raw);
    assert_eq!(payload.reply, raw);
    assert!(payload.name.is_none());
    assert!(payload.address.is_none());
    assert!(payload.note.is_none());

    // A JSON array is not a dialogue object either
    let payload = parse_payload(r#"["reply", "x"]"#);
    assert_eq!(payload.reply, r#"["reply", "x"]"#);
}

#[test]
fn test_profile_update_latest_wins() {
    let mut profile = Profile::default();
    let mut notes = Vec::new();

    let first = parse_payload(r#"{"reply": "ok", "name": "رضا"}"#);
    assert!(first.apply_to(&mut profile, &mut notes));
    assert_eq!(profile.name.as_deref(), Some("رضا"));

    // Same values again: nothing changes, no snapshot write needed
    assert!(!first.apply_to(&mut profile, &mut notes));

    // New address overwrites wholesale
    let second = parse_payload(r#"{"reply": "ok", "name": "رضا", "address": "شیراز"}"#);
    assert!(second.apply_to(&mut profile, &mut notes));
    assert_eq!(profile.address.as_deref(), Some("شیراز"));

    let third = parse_payload(r#"{"reply": "ok", "address": "تهران"}"#);
    assert!(third.apply_to(&mut profile, &mut notes));
    assert_eq!(profile.address.as_deref(), Some("تهران"));
    // Name untouched by a payload that does not carry one
    assert_eq!(profile.name.as_deref(), Some("رضا"));
    assert!(notes.is_empty());
}

#[test]
fn test_notes_accumulate() {
    let mut profile = Profile::default();
    let mut notes = Vec::new();

    let a = parse_payload(r#"{"reply": "ok", "appointment": "شنبه"}"#);
    let b = parse_payload(r#"{"reply": "ok", "notes": "بیمه ندارد"}"#);
    assert!(a.apply_to(&mut profile, &mut notes));
    assert!(b.apply_to(&mut profile, &mut notes));
    assert_eq!(notes, vec!["شنبه".to_string(), "بیمه ندارد".to_string()]);
}

#[test]
fn test_prompt_assembly_with_full_context() {
    let mut history = History::new(16);
    history.push(Role::User, "سلام");
    history.push(Role::Assistant, "بفرمایید");

    let clients = vec!["حمید".to_string()];
    let profile = Profile {
        name: None,
        address: None,
    };
    let snapshot = Snapshot {
        session: "drx-20250820-090000-aaaa".to_string(),
        profile: Profile {
            name: Some("حمید".to_string()),
            address: Some("کرج".to_string()),
        },
        notes: vec![],
    };

    let ctx = TurnContext {
        session_name: "drx-20250821-110000-bbbb",
        known_clients: &clients,
        possible_return: Some("حمید"),
        previous_snapshot: Some(&snapshot),
        history: &history,
        profile: &profile,
    };

    let prompt = build_turn_prompt(&ctx, "من حمید هستم");

    // Every context section the model relies on must be present
    assert!(prompt.contains("Session name: drx-20250821-110000-bbbb"));
    assert!(prompt.contains(r#"["حمید"]"#));
    assert!(prompt.contains("Possible returning client mentioned: حمید"));
    assert!(prompt.contains("drx-20250820-090000-aaaa"));
    assert!(prompt.contains("user: سلام"));
    assert!(prompt.contains("assistant: بفرمایید"));
    assert!(prompt.contains("Caller statement: من حمید هستم"));
    assert!(prompt.ends_with("Return only JSON as described earlier."));
}

#[test]
fn test_prompt_with_empty_context() {
    let history = History::new(16);
    let profile = Profile::default();
    let ctx = TurnContext {
        session_name: "drx-1",
        known_clients: &[],
        possible_return: None,
        previous_snapshot: None,
        history: &history,
        profile: &profile,
    };

    let prompt = build_turn_prompt(&ctx, "hello");
    assert!(prompt.contains("Known returning clients: []"));
    assert!(prompt.contains("Possible returning client mentioned: none"));
    assert!(prompt.contains("No prior conversation."));
    assert!(prompt.contains("snapshot (for reference only—confirm before reuse): {}"));
}
