// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use echo_queue::{EventQueue, SubmissionQueue};
use echo_types::{Event, EventPayload, EventType, Submission, SubmissionOperation, TaskCompleted, TaskStatus};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A handler for one kind of [`SubmissionOperation`] (§4.2). Handlers emit
/// their own `agent.output` / `tool.event` / `plan.updated` events; the
/// manager owns only the lifecycle brackets (`task.started`/`task.completed`)
/// and never re-emits handler payloads.
#[async_trait]
pub trait SubmissionHandler: Send + Sync {
    async fn handle(&self, submission: &Submission, eq: &EventQueue, cancel: CancellationToken) -> anyhow::Result<()>;
}

fn operation_kind(op: &SubmissionOperation) -> &'static str {
    match op {
        SubmissionOperation::UserInput { .. } => "user_input",
        SubmissionOperation::Interrupt {} => "interrupt",
        SubmissionOperation::ApprovalDecision { .. } => "approval_decision",
    }
}

/// Owns the SQ/EQ pair and a registry `operation_kind → Handler` (§4.2). A
/// single worker drains SQ, but never blocks on a turn: each submission is
/// dispatched onto its own `tokio::spawn`ed task so `interrupt` and
/// `approval_decision` submissions for other turns are never stuck behind
/// one that's still running (§4.2 AMBIENT). Per-session turn serialization
/// (§5 — cross-session parallelism is fine, but only one turn per session
/// at a time) is enforced by a `HashMap<SessionId, Mutex<()>>` guard the
/// `user_input` path acquires before running; `approval_decision` never
/// takes this lock, since the turn it unblocks may be the one holding it.
pub struct EventManager {
    sq: SubmissionQueue,
    eq: Arc<EventQueue>,
    handlers: HashMap<&'static str, Arc<dyn SubmissionHandler>>,
    session_cancels: Arc<Mutex<HashMap<String, CancellationToken>>>,
    session_turn_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl EventManager {
    pub fn new(sq_capacity: usize) -> Self {
        Self {
            sq: SubmissionQueue::new(sq_capacity),
            eq: Arc::new(EventQueue::new()),
            handlers: HashMap::new(),
            session_cancels: Arc::new(Mutex::new(HashMap::new())),
            session_turn_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn register_handler(&mut self, kind: &'static str, handler: Arc<dyn SubmissionHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn sq_sender(&self) -> echo_queue::SqSender {
        self.sq.sender()
    }

    pub fn eq(&self) -> Arc<EventQueue> {
        self.eq.clone()
    }

    /// Allocates a submission id, stamps timestamp/priority, enqueues, and
    /// immediately publishes `submission.accepted` (§4.2).
    pub async fn submit(&self, submission: Submission, cancel_token: &CancellationToken) -> anyhow::Result<String> {
        let id = submission.id.clone();
        let op_json = serde_json::to_value(&submission.operation).unwrap_or(serde_json::Value::Null);
        self.eq.publish(Event::new(
            EventType::SubmissionAccepted,
            &id,
            &submission.session_id,
            EventPayload::SubmissionAccepted { operation: op_json },
        ));
        self.sq.sender().submit(submission, cancel_token).await?;
        Ok(id)
    }

    /// Drains SQ until closed, dispatching each submission to its handler
    /// and bracketing it with `task.started`/`task.completed` (§4.2).
    /// Dispatch never blocks the loop: every submission runs in its own
    /// spawned task, so a turn in flight can't stall a later `interrupt` or
    /// `approval_decision` behind it. `interrupt` is handled inline here —
    /// it cancels the named session's in-flight turn and reports
    /// `"interrupted"` directly rather than going through the handler
    /// registry (§4.5, §5 Cancellation). Pending turns are joined before the
    /// EQ is closed so no `task.completed` is ever dropped on shutdown.
    pub async fn run(&mut self) {
        let handlers = Arc::new(self.handlers.clone());
        let mut turns = Vec::new();

        loop {
            let submission = match self.sq.receive().await {
                Ok(s) => s,
                Err(_) => break,
            };

            self.eq.publish(Event::new(EventType::TaskStarted, &submission.id, &submission.session_id, EventPayload::TaskStarted {}));

            if let SubmissionOperation::Interrupt {} = &submission.operation {
                let cancelled = self.session_cancels.lock().await.remove(&submission.session_id);
                if let Some(token) = cancelled {
                    token.cancel();
                }
                self.eq.publish(Event::new(
                    EventType::TaskError,
                    &submission.id,
                    &submission.session_id,
                    EventPayload::TaskError { message: "interrupted".to_string() },
                ));
                self.eq.publish(Event::new(
                    EventType::TaskCompleted,
                    &submission.id,
                    &submission.session_id,
                    EventPayload::TaskCompleted(TaskCompleted { status: TaskStatus::Failed, error: Some("interrupted".to_string()) }),
                ));
                continue;
            }

            let is_turn = matches!(submission.operation, SubmissionOperation::UserInput { .. });
            let handlers = handlers.clone();
            let eq = self.eq.clone();
            let session_cancels = self.session_cancels.clone();
            let session_turn_locks = self.session_turn_locks.clone();
            let session_id = submission.session_id.clone();

            turns.push(tokio::spawn(async move {
                let _turn_guard = if is_turn {
                    let lock = session_turn_locks
                        .lock()
                        .await
                        .entry(session_id.clone())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .clone();
                    Some(lock.lock_owned().await)
                } else {
                    None
                };

                // Fresh token per turn: a token cancelled by a prior
                // `interrupt` must never poison the next turn for this
                // session, so `user_input` always installs a new one before
                // running and clears it again once the turn ends.
                let cancel = if is_turn {
                    let fresh = CancellationToken::new();
                    session_cancels.lock().await.insert(session_id.clone(), fresh.clone());
                    fresh
                } else {
                    CancellationToken::new()
                };

                let kind = operation_kind(&submission.operation);
                let result = match handlers.get(kind) {
                    Some(handler) => handler.handle(&submission, &eq, cancel).await,
                    None => Err(anyhow::anyhow!("no handler registered for operation '{kind}'")),
                };

                if is_turn {
                    session_cancels.lock().await.remove(&session_id);
                }

                match result {
                    Ok(()) => {
                        eq.publish(Event::new(
                            EventType::TaskCompleted,
                            &submission.id,
                            &submission.session_id,
                            EventPayload::TaskCompleted(TaskCompleted { status: TaskStatus::Completed, error: None }),
                        ));
                    }
                    Err(e) => {
                        eq.publish(Event::new(
                            EventType::TaskError,
                            &submission.id,
                            &submission.session_id,
                            EventPayload::TaskError { message: e.to_string() },
                        ));
                        eq.publish(Event::new(
                            EventType::TaskCompleted,
                            &submission.id,
                            &submission.session_id,
                            EventPayload::TaskCompleted(TaskCompleted { status: TaskStatus::Failed, error: Some(e.to_string()) }),
                        ));
                    }
                }
            }));
        }

        for turn in turns {
            let _ = turn.await;
        }
        self.eq.close();
    }

    pub fn close(&mut self) {
        self.sq.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_types::{InputContext, SubmissionOperation};

    struct OkHandler;
    #[async_trait]
    impl SubmissionHandler for OkHandler {
        async fn handle(&self, _s: &Submission, _eq: &EventQueue, _cancel: CancellationToken) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct FailHandler;
    #[async_trait]
    impl SubmissionHandler for FailHandler {
        async fn handle(&self, _s: &Submission, _eq: &EventQueue, _cancel: CancellationToken) -> anyhow::Result<()> {
            anyhow::bail!("handler exploded")
        }
    }

    fn user_input_submission() -> Submission {
        Submission::new(
            "sess-1",
            SubmissionOperation::UserInput {
                items: vec![],
                context: InputContext { session_id: "sess-1".into(), ..Default::default() },
            },
        )
    }

    #[tokio::test]
    async fn successful_handler_yields_completed_status() {
        let mut manager = EventManager::new(8);
        manager.register_handler("user_input", Arc::new(OkHandler));
        let mut sub = manager.eq().subscribe().unwrap();
        let token = CancellationToken::new();
        manager.submit(user_input_submission(), &token).await.unwrap();
        manager.close();
        manager.run().await;

        let events: Vec<_> = {
            let mut v = Vec::new();
            while let Ok(e) = sub.try_recv() {
                v.push(e);
            }
            v
        };
        assert!(events.iter().any(|e| e.event_type == EventType::SubmissionAccepted));
        assert!(events.iter().any(|e| e.event_type == EventType::TaskStarted));
        let terminal = events.last().unwrap();
        assert_eq!(terminal.event_type, EventType::TaskCompleted);
    }

    #[tokio::test]
    async fn failing_handler_yields_task_error_then_failed_completion() {
        let mut manager = EventManager::new(8);
        manager.register_handler("user_input", Arc::new(FailHandler));
        let mut sub = manager.eq().subscribe().unwrap();
        let token = CancellationToken::new();
        manager.submit(user_input_submission(), &token).await.unwrap();
        manager.close();
        manager.run().await;

        let mut events = Vec::new();
        while let Ok(e) = sub.try_recv() {
            events.push(e);
        }
        let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert!(kinds.contains(&EventType::TaskError));
        assert_eq!(*kinds.last().unwrap(), EventType::TaskCompleted);
    }

    #[tokio::test]
    async fn missing_handler_is_reported_like_an_error() {
        let mut manager = EventManager::new(8);
        let mut sub = manager.eq().subscribe().unwrap();
        let token = CancellationToken::new();
        manager.submit(user_input_submission(), &token).await.unwrap();
        manager.close();
        manager.run().await;

        let mut events = Vec::new();
        while let Ok(e) = sub.try_recv() {
            events.push(e);
        }
        assert!(events.iter().any(|e| e.event_type == EventType::TaskError));
    }

    #[tokio::test]
    async fn ordering_submission_accepted_precedes_task_started_precedes_completed() {
        let mut manager = EventManager::new(8);
        manager.register_handler("user_input", Arc::new(OkHandler));
        let mut sub = manager.eq().subscribe().unwrap();
        let token = CancellationToken::new();
        manager.submit(user_input_submission(), &token).await.unwrap();
        manager.close();
        manager.run().await;

        let mut events = Vec::new();
        while let Ok(e) = sub.try_recv() {
            events.push(e);
        }
        let positions: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        let accepted = positions.iter().position(|t| *t == EventType::SubmissionAccepted).unwrap();
        let started = positions.iter().position(|t| *t == EventType::TaskStarted).unwrap();
        let completed = positions.iter().position(|t| *t == EventType::TaskCompleted).unwrap();
        assert!(accepted < started);
        assert!(started < completed);
    }

    struct ControlledHandler {
        started: Arc<tokio::sync::Notify>,
        invocation: std::sync::atomic::AtomicUsize,
        second_call_cancelled: Arc<std::sync::atomic::AtomicBool>,
        second_call_done: Arc<tokio::sync::Notify>,
    }
    #[async_trait]
    impl SubmissionHandler for ControlledHandler {
        async fn handle(&self, _s: &Submission, _eq: &EventQueue, cancel: CancellationToken) -> anyhow::Result<()> {
            let call = self.invocation.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if call == 0 {
                // First turn: announce that our token is already registered,
                // then wait to be cancelled by the interrupt.
                self.started.notify_one();
                cancel.cancelled().await;
                anyhow::bail!("interrupted");
            }
            self.second_call_cancelled.store(cancel.is_cancelled(), std::sync::atomic::Ordering::SeqCst);
            self.second_call_done.notify_one();
            Ok(())
        }
    }

    #[tokio::test]
    async fn a_turn_after_an_interrupt_gets_a_fresh_uncancelled_token() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        let mut manager = EventManager::new(8);
        let started = Arc::new(tokio::sync::Notify::new());
        let second_call_cancelled = Arc::new(AtomicBool::new(true));
        let second_call_done = Arc::new(tokio::sync::Notify::new());
        manager.register_handler(
            "user_input",
            Arc::new(ControlledHandler {
                started: started.clone(),
                invocation: AtomicUsize::new(0),
                second_call_cancelled: second_call_cancelled.clone(),
                second_call_done: second_call_done.clone(),
            }),
        );

        let sender = manager.sq_sender();
        let token = CancellationToken::new();
        sender.submit(user_input_submission(), &token).await.unwrap();

        let run_handle = tokio::spawn(async move {
            manager.run().await;
        });

        // Wait for the first turn to register its token before interrupting,
        // so the interrupt has something real to cancel.
        started.notified().await;
        sender.submit(Submission::new("sess-1", SubmissionOperation::Interrupt {}), &token).await.unwrap();
        sender.submit(user_input_submission(), &token).await.unwrap();
        second_call_done.notified().await;

        assert!(!second_call_cancelled.load(Ordering::SeqCst), "a fresh turn must not inherit a cancelled token");
        run_handle.abort();
    }

    #[tokio::test]
    async fn interrupt_for_a_session_with_no_in_flight_turn_is_a_harmless_no_op() {
        let mut manager = EventManager::new(8);
        let mut sub = manager.eq().subscribe().unwrap();
        let token = CancellationToken::new();
        manager.submit(Submission::new("sess-9", SubmissionOperation::Interrupt {}), &token).await.unwrap();
        manager.close();
        manager.run().await;

        let mut events = Vec::new();
        while let Ok(e) = sub.try_recv() {
            events.push(e);
        }
        let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert!(kinds.contains(&EventType::TaskError));
        assert_eq!(*kinds.last().unwrap(), EventType::TaskCompleted);
    }
}
