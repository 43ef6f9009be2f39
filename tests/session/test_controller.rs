//! Integration tests for `SessionController`
//!
//! Commands go to a recording fake; stream events are fed straight into the
//! controller's event receiver.

#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use browser_agent_console::{
    ConsoleError, ConsoleOptions, LogLevel, Result, Session, SessionController, SessionState,
    StreamEvent, TaskRequest, UploadFile, parse_event,
};
use common::{Call, FakeChannel, ack, init_logging};
use serde_json::{Value, json};
use tokio::sync::mpsc;

type EventSender = mpsc::UnboundedSender<Result<StreamEvent>>;

fn setup(channel: &FakeChannel) -> (SessionController, EventSender) {
    setup_with(channel, ConsoleOptions::builder().build().unwrap())
}

fn setup_with(channel: &FakeChannel, options: ConsoleOptions) -> (SessionController, EventSender) {
    init_logging();
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SessionController::spawn(channel.clone(), rx, &options);
    (controller, tx)
}

fn send(tx: &EventSender, value: Value) {
    tx.send(Ok(parse_event(&value.to_string()).unwrap())).unwrap();
}

async fn wait_until(
    controller: &SessionController,
    predicate: impl FnMut(&Session) -> bool,
) -> Session {
    let mut view = controller.subscribe();
    let session = tokio::time::timeout(Duration::from_secs(5), view.wait_for(predicate))
        .await
        .expect("session never reached the expected shape")
        .expect("controller exited");
    session.clone()
}

async fn wait_for_calls(channel: &FakeChannel, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while channel.calls().len() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("command never reached the channel");
}

#[tokio::test]
async fn test_end_to_end_start_then_stream() {
    let channel = FakeChannel::new();
    channel.push_start(Ok(ack(Some("t1"))));
    let (controller, tx) = setup(&channel);

    let task_id = controller
        .start(TaskRequest::new("find price of X"))
        .await
        .unwrap();
    assert_eq!(task_id.unwrap().as_str(), "t1");

    send(&tx, json!({"type": "status", "status": "running"}));
    send(
        &tx,
        json!({"type": "step", "message": "opened page", "results": [{"item": "X", "price": "$10"}]}),
    );

    let session = wait_until(&controller, |s| !s.results.is_empty()).await;
    assert_eq!(session.state, SessionState::Running);
    assert_eq!(session.task_id.as_ref().unwrap().as_str(), "t1");
    assert_eq!(session.results.len(), 1);
    assert_eq!(
        serde_json::to_value(&session.results).unwrap(),
        json!([{"item": "X", "price": "$10"}])
    );
    assert_eq!(session.log.len(), 2);
    assert!(!session.awaiting_confirmation);

    let starts = channel.start_calls();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].task, "find price of X");
    assert_eq!(starts[0].model, "gemini-pro");
}

#[tokio::test]
async fn test_start_rejected_locally_while_active() {
    let channel = FakeChannel::new();
    let (controller, tx) = setup(&channel);

    for status in ["running", "paused"] {
        send(&tx, json!({"type": "status", "status": status}));
        let expected: SessionState = serde_json::from_value(json!(status)).unwrap();
        wait_until(&controller, |s| s.state == expected).await;

        let error = controller.start(TaskRequest::new("again")).await.unwrap_err();
        assert!(matches!(error, ConsoleError::InvalidState { .. }));
    }

    assert!(channel.calls().is_empty());
    let session = controller.snapshot();
    let warnings: Vec<_> = session.log_at_least(LogLevel::Warn).collect();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].message.starts_with("Start rejected"));
}

#[tokio::test]
async fn test_start_accepted_after_stop_and_idle() {
    let channel = FakeChannel::new();
    let (controller, tx) = setup(&channel);

    send(&tx, json!({"type": "status", "status": "running"}));
    wait_until(&controller, |s| s.state == SessionState::Running).await;

    controller.stop().await.unwrap();
    // The stop acknowledgement alone changes nothing.
    assert_eq!(controller.snapshot().state, SessionState::Running);

    send(&tx, json!({"type": "status", "status": "idle"}));
    wait_until(&controller, |s| s.state == SessionState::Idle).await;

    controller.start(TaskRequest::new("next")).await.unwrap();
    let calls = channel.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], Call::Stop);
    assert!(matches!(calls[1], Call::Start(_)));
    assert_eq!(controller.snapshot().state, SessionState::Running);
    assert!(controller.snapshot().awaiting_confirmation);
}

#[tokio::test]
async fn test_stream_event_during_start_wins() {
    let channel = FakeChannel::new();
    let gate = channel.hold_starts();
    let (controller, tx) = setup(&channel);

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start(TaskRequest::new("race")).await })
    };
    wait_for_calls(&channel, 1).await;

    send(
        &tx,
        json!({"type": "status", "status": "running", "task_id": "t7"}),
    );
    wait_until(&controller, |s| s.state_revision == 1).await;

    gate.notify_one();
    let task_id = pending.await.unwrap().unwrap();
    assert_eq!(task_id.unwrap().as_str(), "t7");

    let session = controller.snapshot();
    assert_eq!(session.state, SessionState::Running);
    assert!(!session.awaiting_confirmation);
}

#[tokio::test]
async fn test_stream_completion_before_ack_is_kept() {
    let channel = FakeChannel::new();
    let gate = channel.hold_starts();
    let (controller, tx) = setup(&channel);

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start(TaskRequest::new("quick")).await })
    };
    wait_for_calls(&channel, 1).await;

    send(&tx, json!({"type": "status", "status": "completed"}));
    wait_until(&controller, |s| s.state == SessionState::Completed).await;
    gate.notify_one();
    pending.await.unwrap().unwrap();

    assert_eq!(controller.snapshot().state, SessionState::Completed);
}

#[tokio::test]
async fn test_error_event_fails_pending_start() {
    let channel = FakeChannel::new();
    let gate = channel.hold_starts();
    let (controller, tx) = setup(&channel);

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start(TaskRequest::new("doomed")).await })
    };
    wait_for_calls(&channel, 1).await;

    send(&tx, json!({"type": "error", "message": "browser crashed"}));
    let error = pending.await.unwrap().unwrap_err();
    assert!(matches!(error, ConsoleError::Agent(ref m) if m == "browser crashed"));

    // The late acknowledgement is ignored.
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let session = controller.snapshot();
    assert_eq!(session.state, SessionState::Error);
    assert!(!session.log.iter().any(|e| e.message.starts_with("Task started")));

    // Error allows a fresh start.
    gate.notify_one();
    controller.start(TaskRequest::new("retry")).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_command_timeout_leaves_state() {
    let channel = FakeChannel::new();
    channel.set_delay(Duration::from_secs(60));
    let options = ConsoleOptions::builder()
        .command_timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let (controller, _tx) = setup_with(&channel, options);

    let error = controller.start(TaskRequest::new("slow")).await.unwrap_err();
    assert!(matches!(error, ConsoleError::Timeout(_)));

    let session = controller.snapshot();
    assert_eq!(session.state, SessionState::Idle);
    let last = session.log.last().unwrap();
    assert_eq!(last.level, LogLevel::Error);
    assert!(last.message.starts_with("Start failed"));
}

#[tokio::test]
async fn test_start_failure_keeps_state_and_allows_retry() {
    let channel = FakeChannel::new();
    channel.push_start(Err(ConsoleError::command(
        "start",
        Some(400),
        "Agent already running",
    )));
    let (controller, _tx) = setup(&channel);

    let error = controller.start(TaskRequest::new("one")).await.unwrap_err();
    assert!(error.to_string().contains("Agent already running"));

    let session = controller.snapshot();
    assert_eq!(session.state, SessionState::Idle);
    assert_eq!(session.log.len(), 1);
    assert_eq!(session.log[0].level, LogLevel::Error);

    controller.start(TaskRequest::new("two")).await.unwrap();
    assert_eq!(channel.start_calls().len(), 2);
}

#[tokio::test]
async fn test_second_start_rejected_while_first_in_flight() {
    let channel = FakeChannel::new();
    let gate = channel.hold_starts();
    let (controller, _tx) = setup(&channel);

    let pending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start(TaskRequest::new("first")).await })
    };
    wait_for_calls(&channel, 1).await;

    let error = controller.start(TaskRequest::new("second")).await.unwrap_err();
    assert!(matches!(error, ConsoleError::StartInFlight));
    assert_eq!(
        error.to_string(),
        "Cannot start: another start is already in flight"
    );

    gate.notify_one();
    pending.await.unwrap().unwrap();
    assert_eq!(channel.start_calls().len(), 1);
}

#[tokio::test]
async fn test_lifecycle_commands_are_sent_from_any_state() {
    let channel = FakeChannel::new();
    channel.push_lifecycle(Ok(()));
    channel.push_lifecycle(Err(ConsoleError::command(
        "resume",
        Some(400),
        "Agent not paused",
    )));
    let (controller, _tx) = setup(&channel);

    controller.pause().await.unwrap();
    let error = controller.resume().await.unwrap_err();
    assert!(error.to_string().contains("Agent not paused"));

    assert_eq!(channel.calls(), vec![Call::Pause, Call::Resume]);
    let session = controller.snapshot();
    assert_eq!(session.state, SessionState::Idle);
    assert_eq!(session.log.len(), 2);
    assert_eq!(session.log[0].level, LogLevel::Info);
    assert_eq!(session.log[0].message, "Pause requested");
    assert_eq!(session.log[1].level, LogLevel::Warn);
}

#[tokio::test]
async fn test_upload_is_staged_for_next_start() {
    let channel = FakeChannel::new();
    let (controller, tx) = setup(&channel);

    let document = controller
        .upload(UploadFile::new("notes.txt", b"buy X".to_vec()))
        .await
        .unwrap();
    assert_eq!(document.filename, "notes.txt");

    controller.start(TaskRequest::new("use notes")).await.unwrap();
    send(&tx, json!({"type": "status", "status": "completed"}));
    wait_until(&controller, |s| s.state == SessionState::Completed).await;
    controller.start(TaskRequest::new("no notes")).await.unwrap();

    let starts = channel.start_calls();
    let context = starts[0].context.as_ref().unwrap();
    assert_eq!(context["document"]["filename"], "notes.txt");
    assert_eq!(context["document"]["text_content"], "buy X");
    assert!(starts[1].context.is_none());
}

#[tokio::test]
async fn test_stream_errors_only_log() {
    let channel = FakeChannel::new();
    let (controller, tx) = setup(&channel);

    send(&tx, json!({"type": "status", "status": "running"}));
    wait_until(&controller, |s| s.state == SessionState::Running).await;
    let before = controller.snapshot();

    tx.send(Err(ConsoleError::protocol("bad payload", Some("{".into()))))
        .unwrap();
    tx.send(Err(ConsoleError::transport("agent stream closed by peer")))
        .unwrap();
    let after = wait_until(&controller, |s| s.log.len() == before.log.len() + 2).await;

    assert_eq!(after.state, before.state);
    assert_eq!(after.state_revision, before.state_revision);
    assert_eq!(after.log[after.log.len() - 2].level, LogLevel::Debug);
    assert_eq!(after.log[after.log.len() - 1].level, LogLevel::Warn);
}

#[tokio::test]
async fn test_shutdown_closes_handle() {
    let channel = FakeChannel::new();
    let (controller, _tx) = setup(&channel);
    assert!(controller.is_running());

    controller.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.is_running() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("controller task still running after shutdown");
    let error = controller.start(TaskRequest::new("late")).await.unwrap_err();
    assert!(matches!(error, ConsoleError::Closed(_)));
}
