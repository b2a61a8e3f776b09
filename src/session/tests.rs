use super::*;

fn store() -> SessionStore {
    SessionStore::new(&SessionConfig {
        timeout_minutes: 30,
        context_turns: 5,
        sweep_interval_seconds: 60,
    })
}

#[test]
fn created_sessions_are_retrievable() {
    let store = store();
    let session = store.create_session(HashMap::new());

    let fetched = store.get_session(&session.id).unwrap();
    assert_eq!(fetched.id, session.id);
    assert!(fetched.active);
    assert!(fetched.conversation_history.is_empty());
}

#[test]
fn missing_sessions_return_none() {
    let store = store();
    assert!(store.get_session("nonexistent").is_none());
    assert!(!store.add_turn("nonexistent", "q", "a"));
    assert!(store.get_context("nonexistent", 5).is_empty());
    assert!(!store.end_session("nonexistent"));
}

#[test]
fn history_is_capped_at_fifty_turns() {
    let store = store();
    let session = store.create_session(HashMap::new());

    for i in 0..51 {
        assert!(store.add_turn(&session.id, &format!("question {i}"), &format!("answer {i}")));
    }

    let fetched = store.get_session(&session.id).unwrap();
    assert_eq!(fetched.conversation_history.len(), 50);
    assert_eq!(fetched.conversation_history[0].question, "question 1");
    assert_eq!(fetched.conversation_history[49].question, "question 50");
}

#[test]
fn context_returns_most_recent_turns_oldest_first() {
    let store = store();
    let session = store.create_session(HashMap::new());

    for i in 0..8 {
        store.add_turn(&session.id, &format!("q{i}"), &format!("a{i}"));
    }

    let context = store.get_context(&session.id, 5);
    assert_eq!(context.len(), 5);
    assert_eq!(context[0].0, "q3");
    assert_eq!(context[4].0, "q7");
    assert_eq!(context[4].1, "a7");
}

#[test]
fn update_merges_metadata_and_toggles_active() {
    let store = store();
    let session = store.create_session(HashMap::from([(
        "topic".to_string(),
        Value::String("robotics".to_string()),
    )]));

    let updated = store.update_session(
        &session.id,
        SessionUpdate {
            metadata: Some(HashMap::from([(
                "level".to_string(),
                Value::String("advanced".to_string()),
            )])),
            active: Some(false),
        },
    );
    assert!(updated);

    let fetched = store.get_session(&session.id).unwrap();
    assert!(!fetched.active);
    assert_eq!(fetched.metadata.len(), 2);
}

#[test]
fn ended_sessions_are_gone() {
    let store = store();
    let session = store.create_session(HashMap::new());

    assert!(store.end_session(&session.id));
    assert!(store.get_session(&session.id).is_none());
    assert_eq!(store.session_count(), 0);
}

#[test]
fn sweep_removes_only_idle_sessions() {
    let store = SessionStore::new(&SessionConfig {
        timeout_minutes: 1,
        context_turns: 5,
        sweep_interval_seconds: 60,
    });

    let stale = store.create_session(HashMap::new());
    let fresh = store.create_session(HashMap::new());

    {
        let mut sessions = store.sessions.lock().unwrap();
        let session = sessions.get_mut(&stale.id).unwrap();
        session.last_activity = Utc::now() - Duration::minutes(5);
    }

    assert_eq!(store.sweep_expired(), 1);
    assert!(store.get_session(&stale.id).is_none());
    assert!(store.get_session(&fresh.id).is_some());
}
