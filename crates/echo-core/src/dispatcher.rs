// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use echo_queue::EventQueue;
use echo_tools::{ApprovalPolicy, ProgressSink, ToolPolicy, ToolProgress, ToolRegistry};
use echo_types::{
    Event, EventPayload, EventType, ToolCall, ToolEvent, ToolEventType, ToolKind, ToolResult,
    ToolStatus,
};
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

/// Internal tool bus the dispatcher owns (§2 C4, §4.4): consumers subscribe
/// read-only, separate from the EQ mirror of the same events (§5 "the tool
/// dispatcher's bus is owned by the dispatcher").
pub struct ToolBus {
    tx: broadcast::Sender<ToolEvent>,
}

impl Default for ToolBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: ToolEvent) {
        let _ = self.tx.send(event);
    }
}

struct ForwardingProgress<'a> {
    eq: &'a EventQueue,
    bus: &'a ToolBus,
    submission_id: &'a str,
    session_id: &'a str,
    call: &'a ToolCall,
}

#[async_trait]
impl ProgressSink for ForwardingProgress<'_> {
    async fn report(&self, progress: ToolProgress) {
        let mut result = ToolResult {
            id: self.call.id.clone(),
            kind: self.call.kind,
            status: ToolStatus::Running,
            output: Some(progress.output),
            error: None,
            exit_code: None,
            command: self.call.command.clone(),
            path: self.call.path.clone(),
            diff: None,
            approval_id: None,
            approval_reason: None,
        };
        publish_tool_event(self.eq, self.bus, self.submission_id, self.session_id, ToolEventType::ItemUpdated, &mut result, None);
    }
}

fn publish_tool_event(
    eq: &EventQueue,
    bus: &ToolBus,
    submission_id: &str,
    session_id: &str,
    event_type: ToolEventType,
    result: &mut ToolResult,
    reason: Option<String>,
) {
    let tool_event = ToolEvent { event_type, result: result.clone(), reason };
    bus.publish(tool_event.clone());
    eq.publish(Event::new(
        EventType::ToolEvent,
        submission_id,
        session_id,
        EventPayload::ToolEvent(tool_event),
    ));
}

/// Layers a bus/EQ publisher and an approval gate on top of a
/// [`ToolRegistry`] (§2 C4, §4.4): `item.started` before the handler runs,
/// `item.updated` for intermediate progress, `item.completed` with the
/// terminal result. A call whose policy resolves to `Ask` is suspended as
/// `requires_approval` until [`Dispatcher::resolve_approval`] is called for
/// its id — exactly once (§8 invariant 7, repeated decisions are ignored).
pub struct Dispatcher {
    registry: std::sync::Arc<ToolRegistry>,
    policy: ToolPolicy,
    bus: ToolBus,
    pending_approvals: Mutex<HashMap<String, oneshot::Sender<bool>>>,
}

impl Dispatcher {
    pub fn new(registry: std::sync::Arc<ToolRegistry>, policy: ToolPolicy) -> Self {
        Self { registry, policy, bus: ToolBus::new(), pending_approvals: Mutex::new(HashMap::new()) }
    }

    pub fn bus(&self) -> &ToolBus {
        &self.bus
    }

    /// Resolves a pending approval exactly once; a duplicate or unknown id
    /// is silently ignored (§8 invariant 7).
    pub fn resolve_approval(&self, approval_id: &str, approved: bool) {
        let sender = self.pending_approvals.lock().unwrap().remove(approval_id);
        if let Some(sender) = sender {
            let _ = sender.send(approved);
        }
    }

    fn decide_policy(&self, call: &ToolCall) -> ApprovalPolicy {
        if call.kind == ToolKind::Command {
            if let Some(cmd) = &call.command {
                return self.policy.decide(cmd);
            }
        }
        ApprovalPolicy::Auto
    }

    /// Runs one tool call to a terminal `item.completed`, publishing to both
    /// the EQ and the internal bus at every lifecycle step (§4.4).
    pub async fn dispatch(
        &self,
        call: ToolCall,
        eq: &EventQueue,
        submission_id: &str,
        session_id: &str,
    ) -> ToolResult {
        let mut started = ToolResult {
            id: call.id.clone(),
            kind: call.kind,
            status: ToolStatus::Running,
            output: None,
            error: None,
            exit_code: None,
            command: call.command.clone(),
            path: call.path.clone(),
            diff: None,
            approval_id: None,
            approval_reason: None,
        };
        publish_tool_event(eq, &self.bus, submission_id, session_id, ToolEventType::ItemStarted, &mut started, None);

        let decision = self.decide_policy(&call);
        if decision == ApprovalPolicy::Deny {
            let mut result = ToolResult::err(&call.id, call.kind, "denied by policy");
            publish_tool_event(eq, &self.bus, submission_id, session_id, ToolEventType::ItemCompleted, &mut result, None);
            return result;
        }

        if decision == ApprovalPolicy::Ask {
            let approval_id = Uuid::new_v4().to_string();
            let reason = call.command.clone().unwrap_or_else(|| format!("{:?} call", call.kind));
            let (tx, rx) = oneshot::channel();
            self.pending_approvals.lock().unwrap().insert(approval_id.clone(), tx);

            let mut pending = ToolResult::requires_approval(&call.id, call.kind, &approval_id, &reason);
            publish_tool_event(eq, &self.bus, submission_id, session_id, ToolEventType::ItemUpdated, &mut pending, None);

            let approved = rx.await.unwrap_or(false);
            if !approved {
                let mut result = ToolResult::err(&call.id, call.kind, "denied by user");
                publish_tool_event(eq, &self.bus, submission_id, session_id, ToolEventType::ItemCompleted, &mut result, None);
                return result;
            }
        }

        let progress = ForwardingProgress { eq, bus: &self.bus, submission_id, session_id, call: &call };
        let mut result = self.registry.execute_with_progress(&call, &progress).await;
        publish_tool_event(eq, &self.bus, submission_id, session_id, ToolEventType::ItemCompleted, &mut result, None);
        result
    }
}

/// Adapts [`Dispatcher::resolve_approval`] into the [`crate::SubmissionHandler`]
/// the [`crate::EventManager`] dispatches `approval_decision` submissions to
/// (§4.2, §8 invariant 7). The handler itself never fails — an unknown or
/// already-resolved id is a silent no-op, matching `resolve_approval`.
pub struct ApprovalHandler {
    pub dispatcher: std::sync::Arc<Dispatcher>,
}

#[async_trait]
impl crate::manager::SubmissionHandler for ApprovalHandler {
    async fn handle(
        &self,
        submission: &echo_types::Submission,
        _eq: &EventQueue,
        _cancel: tokio_util::sync::CancellationToken,
    ) -> anyhow::Result<()> {
        if let echo_types::SubmissionOperation::ApprovalDecision { approval_id, approved } = &submission.operation {
            self.dispatcher.resolve_approval(approval_id, *approved);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_tools::ToolRegistry;
    use std::time::Duration;

    fn registry_with_fast_command(workdir: &std::path::Path) -> std::sync::Arc<ToolRegistry> {
        echo_tools::shared_default_registry(workdir, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn auto_policy_call_runs_straight_through() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(registry_with_fast_command(dir.path()), ToolPolicy::default());
        let eq = EventQueue::new();
        let mut sub = eq.subscribe().unwrap();
        let mut call = ToolCall::new("c1", ToolKind::FileRead);
        call.path = Some("missing.txt".into());
        let result = dispatcher.dispatch(call, &eq, "sub-1", "sess-1").await;
        assert_eq!(result.status, ToolStatus::Error);

        let mut types = Vec::new();
        while let Ok(e) = sub.try_recv() {
            types.push(e.event_type);
        }
        assert_eq!(types, vec![EventType::ToolEvent, EventType::ToolEvent]);
    }

    #[tokio::test]
    async fn command_asks_then_runs_once_approved() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(
            registry_with_fast_command(dir.path()),
            ToolPolicy::new(&[], &[]), // empty patterns -> Ask for every command
        );
        let eq = EventQueue::new();
        let mut call = ToolCall::new("c1", ToolKind::Command);
        call.command = Some("echo hi".into());

        let dispatcher = std::sync::Arc::new(dispatcher);
        let _ = &eq;
        // subscribe before spawning: the dispatch task may run to its
        // blocking await before this task is scheduled again, and a
        // broadcast receiver only sees messages sent after it subscribes.
        let mut bus = dispatcher.bus().subscribe();
        let d2 = dispatcher.clone();
        let handle = tokio::spawn(async move { d2.dispatch(call, &EventQueue::new(), "sub-1", "sess-1").await });

        let approval_id = loop {
            let ev = bus.recv().await.unwrap();
            if ev.result.status == ToolStatus::RequiresApproval {
                break ev.result.approval_id.unwrap();
            }
        };
        dispatcher.resolve_approval(&approval_id, true);
        let result = handle.await.unwrap();
        assert_eq!(result.status, ToolStatus::Completed);
    }

    #[tokio::test]
    async fn denied_approval_never_runs_the_handler() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = std::sync::Arc::new(Dispatcher::new(registry_with_fast_command(dir.path()), ToolPolicy::new(&[], &[])));
        let mut call = ToolCall::new("c1", ToolKind::Command);
        call.command = Some("touch should_not_exist.txt".into());
        let mut bus = dispatcher.bus().subscribe();
        let d2 = dispatcher.clone();
        let handle = tokio::spawn(async move { d2.dispatch(call, &EventQueue::new(), "sub-1", "sess-1").await });

        let approval_id = loop {
            let ev = bus.recv().await.unwrap();
            if ev.result.status == ToolStatus::RequiresApproval {
                break ev.result.approval_id.unwrap();
            }
        };
        dispatcher.resolve_approval(&approval_id, false);
        let result = handle.await.unwrap();
        assert_eq!(result.status, ToolStatus::Error);
        assert!(!dir.path().join("should_not_exist.txt").exists());
    }

    #[tokio::test]
    async fn duplicate_resolution_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(registry_with_fast_command(dir.path()), ToolPolicy::new(&[], &[]));
        dispatcher.resolve_approval("never-registered", true);
        // no panic, no-op
    }

    #[tokio::test]
    async fn approval_handler_unblocks_the_waiting_command() {
        use crate::manager::SubmissionHandler;
        use echo_types::{Submission, SubmissionOperation, ToolCall, ToolKind};

        let dir = tempfile::tempdir().unwrap();
        let dispatcher = std::sync::Arc::new(Dispatcher::new(registry_with_fast_command(dir.path()), ToolPolicy::new(&[], &[])));
        let mut call = ToolCall::new("c1", ToolKind::Command);
        call.command = Some("echo hi".into());
        let mut bus = dispatcher.bus().subscribe();
        let d2 = dispatcher.clone();
        let handle = tokio::spawn(async move { d2.dispatch(call, &EventQueue::new(), "sub-1", "sess-1").await });

        let approval_id = loop {
            let ev = bus.recv().await.unwrap();
            if ev.result.status == ToolStatus::RequiresApproval {
                break ev.result.approval_id.unwrap();
            }
        };

        let handler = ApprovalHandler { dispatcher: dispatcher.clone() };
        let submission = Submission::new("sess-1", SubmissionOperation::ApprovalDecision { approval_id, approved: true });
        handler.handle(&submission, &EventQueue::new(), tokio_util::sync::CancellationToken::new()).await.unwrap();

        let result = handle.await.unwrap();
        assert_eq!(result.status, ToolStatus::Completed);
    }
}
