//! Replaying recorded JSON-lines streams.

use std::io::Write;
use std::sync::Arc;

use beacon::{BeaconSettings, ConnectionState, SummaryHandlers, replay};
use beacon_core::SubscriptionKey;
use beacon_settings::BackendMode;
use parking_lot::Mutex;
use serde_json::json;

fn record(message: serde_json::Value) -> String {
    json!({ "workspaceId": "ws", "message": message }).to_string()
}

async fn run(lines: &[String], settings: &BeaconSettings) -> (beacon::ReplayReport, Vec<String>) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    let input = std::io::BufReader::new(file.reopen().unwrap());

    let out = Arc::new(Mutex::new(Vec::new()));
    let sink = out.clone();
    let handlers = Arc::new(SummaryHandlers::new(Arc::new(move |l| sink.lock().push(l))));
    let report = replay(input, settings, handlers).await.unwrap();
    let lines = out.lock().clone();
    (report, lines)
}

#[tokio::test]
async fn replays_a_turn_in_order() {
    let lines = [
        record(json!({"method": "turn/started", "params": {"threadId": "t", "turnId": "u"}})),
        record(json!({"method": "item/agentMessage/delta", "params": {"threadId": "t", "itemId": "m", "delta": "Hi "}})),
        record(json!({"method": "item/agentMessage/delta", "params": {"threadId": "t", "itemId": "m", "delta": "there"}})),
        record(json!({"method": "turn/completed", "params": {"threadId": "t", "turnId": "u"}})),
    ];
    let (report, out) = run(&lines, &BeaconSettings::default()).await;

    assert_eq!(report.routed, 4);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.active_thread, Some(SubscriptionKey::new("ws", "t")));
    assert_eq!(
        out,
        vec![
            "turn_started ws=ws thread=t turn=u".to_owned(),
            r#"agent_message_delta ws=ws thread=t item=m text="Hi there""#.to_owned(),
            "turn_completed ws=ws thread=t turn=u".to_owned(),
        ]
    );
}

#[tokio::test]
async fn legacy_events_are_routed_under_canonical_names() {
    let lines = [record(json!({
        "method": "codex/event/task_started",
        "params": {"conversationId": "t", "msg": {"turn_id": "u"}}
    }))];
    let (_, out) = run(&lines, &BeaconSettings::default()).await;
    assert_eq!(out, vec!["turn_started ws=ws thread=t turn=u".to_owned()]);
}

#[tokio::test]
async fn auto_accepted_approvals_are_counted() {
    let mut settings = BeaconSettings::default();
    let _ = settings
        .dispatcher
        .auto_accept
        .insert("ws".into(), vec![vec!["ls".into()]]);
    let lines = [
        record(json!({"id": 1, "method": "execCommandApproval", "params": {"conversationId": "t", "command": ["ls", "-la"]}})),
        record(json!({"id": 2, "method": "execCommandApproval", "params": {"conversationId": "t", "command": ["ls", ";", "rm"]}})),
    ];
    let (report, out) = run(&lines, &settings).await;
    assert_eq!(report.responses, 1);
    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("approval_request ws=ws id=2"));
}

#[tokio::test]
async fn remote_replay_reports_final_liveness() {
    let mut settings = BeaconSettings::default();
    settings.liveness.backend_mode = BackendMode::Remote;
    let lines = [
        record(json!({"method": "thread/started", "params": {"threadId": "t"}})),
        record(json!({"method": "item/started", "params": {"threadId": "t"}})),
    ];
    let (report, _) = run(&lines, &settings).await;
    assert_eq!(report.final_state, ConnectionState::Live);

    let lines = [
        record(json!({"method": "item/started", "params": {"threadId": "t"}})),
        record(json!({"method": "turn/completed", "params": {"threadId": "t"}})),
    ];
    let (report, _) = run(&lines, &settings).await;
    assert_eq!(report.final_state, ConnectionState::Polling);
}

#[tokio::test]
async fn unknown_methods_warn_once() {
    let lines = [
        record(json!({"method": "future/feature"})),
        record(json!({"method": "future/feature"})),
        record(json!({"method": "thread/compacted", "params": {"threadId": "t"}})),
    ];
    let (_, out) = run(&lines, &BeaconSettings::default()).await;
    assert_eq!(out, vec!["unsupported_method ws=ws method=future/feature".to_owned()]);
}
