//! Tests for folding stream events into a `Session`
//!
//! These exercise the view model directly, without any tasks or channels.

use browser_agent_console::{
    ConsoleError, LogLevel, Session, SessionState, StartAck, StreamEvent, parse_event,
};
use serde_json::{Value, json};

fn event(value: Value) -> StreamEvent {
    parse_event(&value.to_string()).unwrap()
}

fn replay(events: &[Value]) -> Session {
    let mut session = Session::new();
    for value in events {
        session.apply_event(event(value.clone()));
    }
    session
}

#[test]
fn test_last_state_bearing_event_wins() {
    let events = [
        json!({"type": "connected", "status": "idle"}),
        json!({"type": "status", "status": "running"}),
        json!({"type": "step", "message": "clicked"}),
        json!({"type": "status", "status": "paused"}),
        json!({"type": "warning", "message": "slow page"}),
        json!({"type": "status", "status": "running"}),
        json!({"type": "pong"}),
    ];
    let session = replay(&events);
    assert_eq!(session.state, SessionState::Running);
    assert_eq!(session.state_revision, 4);
}

#[test]
fn test_replay_is_deterministic() {
    let events = [
        json!({"type": "status", "status": "running", "task_id": "t9"}),
        json!({"type": "step", "message": "a", "url": "https://a.example", "results": [{"item": "A"}]}),
        json!({"type": "screenshot", "screenshot": "data:image/png;base64,AA"}),
        json!({"type": "status", "status": "completed", "final": [{"item": "A"}, {"item": "B"}]}),
    ];

    let first = replay(&events);
    let second = replay(&events);
    assert_eq!(first.state, second.state);
    assert_eq!(first.task_id, second.task_id);
    assert_eq!(first.results, second.results);
    assert_eq!(first.latest_frame, second.latest_frame);
    assert_eq!(first.current_url, second.current_url);
    assert_eq!(first.state_revision, second.state_revision);
    let messages = |s: &Session| s.log.iter().map(|e| e.message.clone()).collect::<Vec<_>>();
    assert_eq!(messages(&first), messages(&second));

    assert_eq!(first.state, SessionState::Completed);
    assert_eq!(first.results.len(), 2);
    assert_eq!(first.current_url.as_deref(), Some("https://a.example"));
}

#[test]
fn test_results_replace_not_merge() {
    let mut session = Session::new();
    session.apply_event(event(json!({
        "type": "step",
        "results": [{"item": "A"}, {"item": "B"}]
    })));
    session.apply_event(event(json!({"type": "step", "results": [{"item": "C"}]})));
    assert_eq!(session.results.len(), 1);
    assert_eq!(session.results[0].label().as_deref(), Some("C"));

    // A step without results leaves the set alone.
    session.apply_event(event(json!({"type": "step", "message": "scrolling"})));
    assert_eq!(session.results.len(), 1);

    session.apply_event(event(json!({"type": "step", "results": []})));
    assert!(session.results.is_empty());
}

#[test]
fn test_stream_error_adds_one_entry() {
    let mut session = replay(&[json!({"type": "status", "status": "running"})]);
    let before = session.clone();

    let error = parse_event("{garbage").unwrap_err();
    session.record_stream_error(&error);

    assert_eq!(session.log.len(), before.log.len() + 1);
    assert_eq!(session.log.last().unwrap().level, LogLevel::Debug);
    assert_eq!(session.state, before.state);
    assert_eq!(session.results, before.results);
    assert_eq!(session.state_revision, before.state_revision);

    session.record_stream_error(&ConsoleError::transport("connection reset"));
    let last = session.log.last().unwrap();
    assert_eq!(last.level, LogLevel::Warn);
    assert!(last.message.contains("connection reset"));
}

#[test]
fn test_error_event_sets_error_and_logs() {
    let mut session = replay(&[json!({"type": "status", "status": "running"})]);
    assert!(session.apply_event(event(json!({"type": "error", "message": "boom"}))));
    assert_eq!(session.state, SessionState::Error);
    assert!(session.can_start());
    let last = session.log.last().unwrap();
    assert_eq!(last.level, LogLevel::Error);
    assert_eq!(last.message, "boom");
}

#[test]
fn test_events_without_effect_report_unchanged() {
    let mut session = Session::new();
    assert!(!session.apply_event(StreamEvent::Pong));
    assert!(!session.apply_event(StreamEvent::Connected { status: None }));
    assert!(!session.apply_event(event(json!({"type": "heartbeat"}))));
    assert_eq!(session, Session::new());
}

#[test]
fn test_optimistic_start_then_confirmation() {
    let mut session = Session::new();
    session.current_url = Some("https://old.example".to_string());
    let revision = session.state_revision;

    session.acknowledge_start(
        StartAck {
            status: Some("started".to_string()),
            task_id: Some("t1".into()),
        },
        revision,
    );
    assert_eq!(session.state, SessionState::Running);
    assert!(session.awaiting_confirmation);
    assert!(session.current_url.is_none());
    assert_eq!(session.log.last().unwrap().message, "Task started (t1)");

    session.apply_event(event(json!({"type": "status", "status": "running"})));
    assert!(!session.awaiting_confirmation);
    assert_eq!(session.task_id.as_ref().unwrap().as_str(), "t1");
}

#[test]
fn test_late_ack_does_not_override_stream() {
    let mut session = Session::new();
    let revision = session.state_revision;
    session.apply_event(event(json!({"type": "status", "status": "completed", "final": [{"item": "X"}]})));

    session.acknowledge_start(StartAck::default(), revision);
    assert_eq!(session.state, SessionState::Completed);
    assert!(!session.awaiting_confirmation);
    assert_eq!(session.results.len(), 1);
}

#[test]
fn test_end_to_end_fold() {
    let mut session = Session::new();
    let revision = session.state_revision;
    session.acknowledge_start(
        StartAck {
            status: Some("started".to_string()),
            task_id: Some("t1".into()),
        },
        revision,
    );
    session.apply_event(event(json!({"type": "status", "status": "running"})));
    session.apply_event(event(json!({
        "type": "step",
        "message": "opened page",
        "results": [{"item": "X", "price": "$10"}]
    })));

    assert_eq!(session.state, SessionState::Running);
    assert_eq!(session.task_id.as_ref().unwrap().as_str(), "t1");
    assert_eq!(
        serde_json::to_value(&session.results).unwrap(),
        json!([{"item": "X", "price": "$10"}])
    );
    assert_eq!(session.log.len(), 2);
}
