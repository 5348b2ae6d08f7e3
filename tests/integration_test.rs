// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Integration tests wiring the echo-* crates together the way `main.rs`
/// does: submission queue in, event queue out, mock model provider so no
/// network call is ever made.
use std::sync::Arc;
use std::time::Duration;

use echo_core::{ApprovalHandler, Dispatcher, EngineConfig, EventManager, ExecutionEngine, UserInputHandler};
use echo_model::MockProvider;
use echo_session::SessionStore;
use echo_tools::{ApprovalPolicy, ToolPolicy};
use echo_types::{
    EventPayload, EventType, InputContext, InputMessage, Message, Submission, SubmissionOperation,
    TaskStatus, ToolCall, ToolKind, ToolStatus,
};
use tokio_util::sync::CancellationToken;

fn wired(provider: Arc<dyn echo_model::ModelProvider>) -> (EventManager, echo_queue::SqSender, Arc<Dispatcher>) {
    wired_with_policy(provider, ToolPolicy::new(&["*".to_string()], &[]))
}

fn wired_with_policy(
    provider: Arc<dyn echo_model::ModelProvider>,
    policy: ToolPolicy,
) -> (EventManager, echo_queue::SqSender, Arc<Dispatcher>) {
    let dir = tempfile::tempdir().unwrap();
    let registry = echo_tools::shared_default_registry(dir.path(), Duration::from_secs(5));
    let dispatcher = Arc::new(Dispatcher::new(registry, policy));
    let engine = Arc::new(ExecutionEngine::new(provider, dispatcher.clone(), EngineConfig::default()));

    let mut manager = EventManager::new(16);
    manager.register_handler("user_input", Arc::new(UserInputHandler { engine }));
    manager.register_handler("approval_decision", Arc::new(ApprovalHandler { dispatcher: dispatcher.clone() }));
    let sq = manager.sq_sender();
    (manager, sq, dispatcher)
}

fn user_turn(session_id: &str, text: &str) -> Submission {
    Submission::new(
        session_id,
        SubmissionOperation::UserInput {
            items: vec![InputMessage::text(text)],
            context: InputContext { session_id: session_id.to_string(), ..Default::default() },
        },
    )
}

#[tokio::test]
async fn a_turn_runs_through_to_task_completed_with_a_final_output() {
    let (mut manager, sq, _dispatcher) = wired(Arc::new(MockProvider::new("mock-model")));
    let mut sub = manager.eq().subscribe().unwrap();
    let token = CancellationToken::new();
    sq.submit(user_turn("sess-1", "hello there"), &token).await.unwrap();

    let manager_task = tokio::spawn(async move {
        manager.run().await;
    });

    let mut saw_final_output = false;
    let mut terminal_status = None;
    loop {
        let Some(event) = sub.recv().await else { break };
        if let EventPayload::AgentOutput(out) = &event.payload {
            if out.is_final {
                assert!(out.content.contains("hello there"));
                saw_final_output = true;
            }
        }
        if let EventPayload::TaskCompleted(completed) = &event.payload {
            terminal_status = Some(completed.status);
        }
        if event.event_type == EventType::TaskCompleted {
            break;
        }
    }
    assert!(saw_final_output, "expected a final AgentOutput event");
    assert_eq!(terminal_status, Some(TaskStatus::Completed));
    drop(manager_task);
}

#[tokio::test]
async fn a_scripted_tool_call_dispatches_and_reports_a_tool_event() {
    let provider = Arc::new(
        MockProvider::new("mock-model").with_tool_call("call-1", "command", r#"{"command":"echo hi"}"#),
    );
    let (mut manager, sq, _dispatcher) = wired(provider);
    let mut sub = manager.eq().subscribe().unwrap();
    let token = CancellationToken::new();
    sq.submit(user_turn("sess-2", "run echo hi"), &token).await.unwrap();

    let manager_task = tokio::spawn(async move {
        manager.run().await;
    });

    let mut saw_tool_event = false;
    loop {
        let Some(event) = sub.recv().await else { break };
        if event.event_type == EventType::ToolEvent {
            saw_tool_event = true;
        }
        if event.event_type == EventType::TaskCompleted {
            break;
        }
    }
    assert!(saw_tool_event, "expected a ToolEvent while the scripted tool call dispatched");
    drop(manager_task);
}

#[tokio::test]
async fn an_approval_decision_reaches_the_dispatcher_while_its_own_turn_is_still_in_flight() {
    // Regression test: the worker must not block on the in-flight turn, or
    // the `approval_decision` submitted below could never be dequeued and
    // the parked tool call would wait forever.
    let provider = Arc::new(
        MockProvider::new("mock-model").with_tool_call("call-1", "command", r#"{"command":"echo hi"}"#),
    );
    let (mut manager, sq, _dispatcher) = wired_with_policy(provider, ToolPolicy::new(&[], &[]));
    let mut sub = manager.eq().subscribe().unwrap();
    let token = CancellationToken::new();
    let turn = user_turn("sess-4", "run echo hi");
    let turn_id = turn.id.clone();
    sq.submit(turn, &token).await.unwrap();

    let manager_task = tokio::spawn(async move {
        manager.run().await;
    });

    let approval_id = loop {
        let Some(event) = sub.recv().await else { panic!("eq closed before approval was requested") };
        if let EventPayload::ToolEvent(tool_event) = &event.payload {
            if tool_event.result.status == ToolStatus::RequiresApproval {
                break tool_event.result.approval_id.clone().unwrap();
            }
        }
    };

    sq.submit(
        Submission::new("sess-4", SubmissionOperation::ApprovalDecision { approval_id, approved: true }),
        &token,
    )
    .await
    .unwrap();

    let mut terminal_status = None;
    loop {
        let Some(event) = sub.recv().await else { break };
        if event.submission_id != turn_id {
            // The `approval_decision` submission gets its own lifecycle
            // bracket; only the original turn's completion matters here.
            continue;
        }
        if let EventPayload::TaskCompleted(completed) = &event.payload {
            terminal_status = Some(completed.status);
            break;
        }
    }
    assert_eq!(terminal_status, Some(TaskStatus::Completed));
    drop(manager_task);
}

#[tokio::test]
async fn interrupting_a_session_is_handled_inline_without_a_dangling_turn() {
    let (mut manager, sq, _dispatcher) = wired(Arc::new(MockProvider::new("mock-model")));
    let token = CancellationToken::new();
    sq.submit(Submission::new("sess-3", SubmissionOperation::Interrupt {}), &token).await.unwrap();
    manager.close();
    manager.run().await;
}

#[test]
fn tool_policy_resolves_deny_over_auto_and_falls_back_to_ask() {
    let policy = ToolPolicy::new(&["rm *".to_string()], &["rm -rf /*".to_string()]);
    assert_eq!(policy.decide("rm -rf /*"), ApprovalPolicy::Deny);
    assert_eq!(policy.decide("rm foo.txt"), ApprovalPolicy::Auto);
    assert_eq!(policy.decide("git status"), ApprovalPolicy::Ask);
}

#[tokio::test]
async fn builtin_file_read_tool_reports_errors_without_failing_the_call() {
    let dir = tempfile::tempdir().unwrap();
    let registry = echo_tools::default_registry(dir.path(), Duration::from_secs(5));
    let mut call = ToolCall::new("c1", ToolKind::FileRead);
    call.path = Some("does-not-exist.txt".to_string());
    let result = registry.execute(&call).await;
    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.error.is_some());
}

#[test]
fn a_session_round_trips_through_the_store_with_a_persisted_message() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    let mut record = store.new_session(dir.path().to_string_lossy());
    record.push(Message::user("what does this function do?"));
    store.save(&record).unwrap();

    let loaded = store.load(&record.id).unwrap().expect("session was just saved");
    assert_eq!(loaded.messages.len(), 1);
    assert_eq!(loaded.id, record.id);
}
