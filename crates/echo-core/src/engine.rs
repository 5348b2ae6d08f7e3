// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use echo_queue::EventQueue;
use echo_types::{
    Event, EventPayload, EventType, InputContext, InputMessage, Message as CoreMessage, Role as CoreRole,
    Submission, SubmissionOperation, ToolCall, ToolKind,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::manager::SubmissionHandler;

/// Tunables for one engine instance (§4.5, §6 `--timeout`/`--retries`,
/// and the compaction knobs `RuntimeConfig` exposes as `-c` overrides).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_tool_rounds: u32,
    pub request_timeout: Duration,
    pub retries: u32,
    /// Fraction of the model's nominal context window past which the
    /// engine compacts the persisted history before assembling a prompt.
    pub compaction_threshold: f32,
    pub compaction_keep_recent: usize,
    pub context_window_tokens: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 50,
            request_timeout: Duration::from_secs(120),
            retries: 2,
            compaction_threshold: 0.85,
            compaction_keep_recent: 6,
            context_window_tokens: 180_000,
        }
    }
}

fn to_model_message(m: &CoreMessage) -> echo_model::Message {
    match m.role {
        CoreRole::User => echo_model::Message::user(m.content.clone()),
        CoreRole::Assistant => echo_model::Message::assistant(m.content.clone()),
        CoreRole::System => echo_model::Message::system(m.content.clone()),
        CoreRole::Tool => echo_model::Message::tool_result("", m.content.clone()),
    }
}

/// Drops every `tool`-role and `system`-role message so only `user`/
/// `assistant` survive — the exact filter `seed_history` and prompt
/// assembly both apply (§4.5, §8 invariant 5).
fn filter_persistable(messages: &[CoreMessage]) -> Vec<CoreMessage> {
    messages.iter().filter(|m| m.is_persistable()).cloned().collect()
}

/// One tool call assembled from a (possibly multi-chunk) streamed response.
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

fn tool_kind_from_name(name: &str) -> Option<ToolKind> {
    match name {
        "command" => Some(ToolKind::Command),
        "apply_patch" => Some(ToolKind::ApplyPatch),
        "file_read" => Some(ToolKind::FileRead),
        "search" => Some(ToolKind::Search),
        "update_plan" => Some(ToolKind::UpdatePlan),
        _ => None,
    }
}

fn build_tool_call(pending: &PendingCall) -> ToolCall {
    let args: serde_json::Value = serde_json::from_str(&pending.arguments).unwrap_or(serde_json::Value::Null);
    let mut call = ToolCall::new(
        pending.id.clone(),
        tool_kind_from_name(&pending.name).unwrap_or(ToolKind::Command),
    );
    call.command = args.get("command").and_then(|v| v.as_str()).map(str::to_string);
    call.path = args.get("path").and_then(|v| v.as_str()).map(str::to_string);
    call.patch = args.get("patch").and_then(|v| v.as_str()).map(str::to_string);
    call.args = args;
    call
}

/// System preamble assembly order (§4.5 step 1): language, review-mode,
/// output-schema, reasoning-effort, then discovered `AGENTS.md` text.
fn system_preambles(ctx: &InputContext) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(system) = &ctx.system {
        out.push(system.clone());
    }
    if let Some(lang) = &ctx.language {
        out.push(format!("Respond in {lang}."));
    }
    if ctx.review_mode {
        out.push("You are in review mode: focus on correctness, do not make changes unless asked.".to_string());
    }
    if let Some(schema) = &ctx.output_schema {
        out.push(format!("Respond with JSON matching this schema:\n{schema}"));
    }
    if let Some(effort) = &ctx.reasoning_effort {
        out.push(format!("Use {effort} reasoning effort."));
    }
    out.extend(ctx.instructions.iter().cloned());
    out
}

fn attachment_messages(attachments: &[InputMessage]) -> Vec<echo_model::Message> {
    attachments
        .iter()
        .map(|a| {
            if a.is_image {
                if let Some(path) = &a.attachment_path {
                    echo_model::Message {
                        role: echo_model::Role::User,
                        content: echo_model::MessageContent::ContentParts(vec![echo_model::ContentPart::image(path.clone())]),
                    }
                } else {
                    echo_model::Message::user(a.text.clone())
                }
            } else {
                echo_model::Message::user(a.text.clone())
            }
        })
        .collect()
}

/// The per-session turn state machine (§4.5): assembles the prompt,
/// streams the model's output, parses tool calls, runs them through the
/// [`Dispatcher`], and loops until a purely textual final message or the
/// iteration budget is exhausted.
pub struct ExecutionEngine {
    provider: Arc<dyn echo_model::ModelProvider>,
    dispatcher: Arc<Dispatcher>,
    config: EngineConfig,
    histories: Mutex<HashMap<String, Vec<CoreMessage>>>,
}

impl ExecutionEngine {
    pub fn new(provider: Arc<dyn echo_model::ModelProvider>, dispatcher: Arc<Dispatcher>, config: EngineConfig) -> Self {
        Self { provider, dispatcher, config, histories: Mutex::new(HashMap::new()) }
    }

    /// Replaces the engine's per-session history with a filtered copy of
    /// `messages` — the operation invoked when resuming a saved session
    /// (§4.5, §8 invariant 5, round-trip scenario in §8).
    pub fn seed_history(&self, session_id: &str, messages: &[CoreMessage]) {
        let filtered = filter_persistable(messages);
        self.histories.lock().unwrap().insert(session_id.to_string(), filtered);
    }

    /// The persisted conversation for a session, suitable for writing back
    /// to a [`echo_types::SessionRecord`].
    pub fn history(&self, session_id: &str) -> Vec<CoreMessage> {
        self.histories.lock().unwrap().get(session_id).cloned().unwrap_or_default()
    }

    fn push_history(&self, session_id: &str, message: CoreMessage) {
        self.histories.lock().unwrap().entry(session_id.to_string()).or_default().push(message);
    }

    async fn run_turn(&self, submission: &Submission, eq: &EventQueue, cancel: CancellationToken) -> anyhow::Result<()> {
        let (items, ctx) = match &submission.operation {
            SubmissionOperation::UserInput { items, context } => (items.clone(), context.clone()),
            other => anyhow::bail!("execution engine cannot handle operation {other:?}"),
        };

        let persisted = {
            let history = self.history(&submission.session_id);
            crate::compact::compact_if_needed(
                &self.provider,
                &history,
                self.config.context_window_tokens,
                self.config.compaction_threshold,
                self.config.compaction_keep_recent,
            )
            .await
        };

        let mut prompt_messages: Vec<echo_model::Message> = Vec::new();
        for text in system_preambles(&ctx) {
            prompt_messages.push(echo_model::Message::system(text));
        }
        prompt_messages.extend(persisted.iter().map(to_model_message));
        prompt_messages.extend(attachment_messages(&ctx.attachments));
        for item in &items {
            prompt_messages.push(echo_model::Message::user(item.text.clone()));
        }

        let mut sequence: u64 = 0;
        let mut rounds = 0u32;

        loop {
            if cancel.is_cancelled() {
                anyhow::bail!("interrupted");
            }
            rounds += 1;
            if rounds > self.config.max_tool_rounds {
                anyhow::bail!("tool call iteration budget exhausted");
            }

            let request = echo_model::CompletionRequest { messages: prompt_messages.clone(), tools: vec![], stream: true };
            let stream_result = tokio::select! {
                biased;
                _ = cancel.cancelled() => anyhow::bail!("interrupted"),
                r = self.provider.complete(request) => r,
            };
            let mut stream = stream_result?;

            let mut accumulator = String::new();
            let mut pending_calls: Vec<PendingCall> = Vec::new();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => anyhow::bail!("interrupted"),
                    n = stream.next() => n,
                };
                let Some(event) = next else { break };
                match event? {
                    echo_model::ResponseEvent::TextDelta(chunk) => {
                        if chunk.is_empty() {
                            continue;
                        }
                        accumulator.push_str(&chunk);
                        sequence += 1;
                        eq.publish(Event::new(
                            EventType::AgentOutput,
                            &submission.id,
                            &submission.session_id,
                            EventPayload::AgentOutput(echo_types::event::AgentOutput {
                                content: chunk,
                                is_final: false,
                                sequence,
                                metadata: Default::default(),
                            }),
                        ));
                    }
                    echo_model::ResponseEvent::ToolCall { id, name, arguments } => {
                        if !id.is_empty() {
                            pending_calls.push(PendingCall { id, name, arguments });
                        } else if let Some(last) = pending_calls.last_mut() {
                            last.arguments.push_str(&arguments);
                        }
                    }
                    echo_model::ResponseEvent::Usage(_) => {}
                    echo_model::ResponseEvent::Done => break,
                    echo_model::ResponseEvent::Error(message) => anyhow::bail!(message),
                }
            }

            if pending_calls.is_empty() {
                // Empty-chunk accumulator with nothing streamed still needs
                // a final event so invariant 2 (exactly one final output)
                // holds even for a degenerate silent turn (§4.5).
                let text = accumulator;
                sequence += 1;
                eq.publish(Event::new(
                    EventType::AgentOutput,
                    &submission.id,
                    &submission.session_id,
                    EventPayload::AgentOutput(echo_types::event::AgentOutput {
                        content: text.clone(),
                        is_final: true,
                        sequence,
                        metadata: Default::default(),
                    }),
                ));

                for item in &items {
                    self.push_history(&submission.session_id, CoreMessage::user(item.text.clone()));
                }
                self.push_history(&submission.session_id, CoreMessage::assistant(text));
                return Ok(());
            }

            // ToolCallsPending -> AwaitingToolResults (§4.5): run every call
            // through the dispatcher, thread results back as the next
            // iteration's input. Calls are independent — run concurrently.
            let calls: Vec<ToolCall> = pending_calls.iter().map(build_tool_call).collect();
            for call in &calls {
                prompt_messages.push(echo_model::Message::tool_call(&call.id, call_name(call.kind), pending_call_args(&call.args)));
            }

            // Calls with distinct ids are independent (§4.4); the dispatcher
            // itself is `Send + Sync` so a caller with an owned `EventQueue`
            // could fan these out with `futures::future::join_all`. Here
            // `eq` is borrowed for the whole turn, so they run in sequence.
            for call in calls {
                let result = self.dispatcher.dispatch(call, eq, &submission.id, &submission.session_id).await;
                let text = result.output.clone().or(result.error.clone()).unwrap_or_default();
                prompt_messages.push(echo_model::Message::tool_result(&result.id, text));
            }

            if let Some(plan_call) = pending_calls.iter().find(|c| c.name == "update_plan") {
                if let Ok(args) = serde_json::from_str::<serde_json::Value>(&plan_call.arguments) {
                    if let Some(plan) = parse_plan(&args) {
                        eq.publish(Event::new(
                            EventType::PlanUpdated,
                            &submission.id,
                            &submission.session_id,
                            EventPayload::PlanUpdated(plan),
                        ));
                    }
                }
            }
        }
    }
}

fn call_name(kind: ToolKind) -> &'static str {
    kind.as_str()
}

fn pending_call_args(v: &serde_json::Value) -> String {
    serde_json::to_string(v).unwrap_or_default()
}

fn parse_plan(args: &serde_json::Value) -> Option<echo_types::event::PlanUpdate> {
    let steps = args.get("plan")?.as_array()?;
    let plan = steps
        .iter()
        .filter_map(|s| {
            let step = s.get("step")?.as_str()?.to_string();
            let status = match s.get("status")?.as_str()? {
                "pending" => echo_types::event::PlanStepStatus::Pending,
                "in_progress" => echo_types::event::PlanStepStatus::InProgress,
                "completed" => echo_types::event::PlanStepStatus::Completed,
                _ => return None,
            };
            Some(echo_types::event::PlanStep { step, status })
        })
        .collect();
    Some(echo_types::event::PlanUpdate {
        explanation: args.get("explanation").and_then(|v| v.as_str()).map(str::to_string),
        plan,
    })
}

/// Adapts [`ExecutionEngine`] into the [`SubmissionHandler`] the
/// [`crate::EventManager`] dispatches `user_input` submissions to.
pub struct UserInputHandler {
    pub engine: Arc<ExecutionEngine>,
}

#[async_trait]
impl SubmissionHandler for UserInputHandler {
    async fn handle(&self, submission: &Submission, eq: &EventQueue, cancel: CancellationToken) -> anyhow::Result<()> {
        self.engine.run_turn(submission, eq, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_model::MockProvider;
    use echo_tools::ToolPolicy;
    use echo_types::{EventType, InputContext, Priority};

    fn engine_with_mock(provider: MockProvider) -> Arc<ExecutionEngine> {
        let dir = tempfile::tempdir().unwrap();
        let registry = echo_tools::shared_default_registry(dir.path(), Duration::from_secs(5));
        let dispatcher = Arc::new(Dispatcher::new(registry, ToolPolicy::default()));
        Arc::new(ExecutionEngine::new(Arc::new(provider), dispatcher, EngineConfig::default()))
    }

    fn user_input(session: &str, text: &str) -> Submission {
        let mut s = Submission::new(
            session,
            SubmissionOperation::UserInput {
                items: vec![InputMessage::text(text)],
                context: InputContext { session_id: session.into(), ..Default::default() },
            },
        );
        s.priority = Priority::Normal;
        s
    }

    #[tokio::test]
    async fn plain_text_turn_emits_one_final_agent_output() {
        let engine = engine_with_mock(MockProvider::new("mock-1"));
        let eq = EventQueue::new();
        let mut sub = eq.subscribe().unwrap();
        let submission = user_input("s1", "hello");
        let cancel = CancellationToken::new();
        engine.run_turn(&submission, &eq, cancel).await.unwrap();

        let mut finals = 0;
        while let Ok(e) = sub.try_recv() {
            if let EventPayload::AgentOutput(out) = e.payload {
                if out.is_final {
                    finals += 1;
                    assert_eq!(out.content, "assistant: hello");
                }
            }
        }
        assert_eq!(finals, 1);
    }

    #[tokio::test]
    async fn final_turn_appends_user_and_assistant_to_persisted_history() {
        let engine = engine_with_mock(MockProvider::new("mock-1"));
        let eq = EventQueue::new();
        let submission = user_input("s1", "hi there");
        engine.run_turn(&submission, &eq, CancellationToken::new()).await.unwrap();
        let history = engine.history("s1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, CoreRole::User);
        assert_eq!(history[1].role, CoreRole::Assistant);
    }

    #[tokio::test]
    async fn tool_call_round_trip_runs_the_tool_then_produces_final_text() {
        let provider = MockProvider::new("mock-1").with_tool_call("c1", "command", r#"{"command":"echo hi"}"#);
        let engine = engine_with_mock(provider);
        let eq = EventQueue::new();
        let mut sub = eq.subscribe().unwrap();
        let submission = user_input("s1", "run it");
        engine.run_turn(&submission, &eq, CancellationToken::new()).await.unwrap();

        let mut saw_tool_event = false;
        let mut saw_final = false;
        while let Ok(e) = sub.try_recv() {
            match e.payload {
                EventPayload::ToolEvent(_) => saw_tool_event = true,
                EventPayload::AgentOutput(out) if out.is_final => saw_final = true,
                _ => {}
            }
        }
        assert!(saw_tool_event);
        assert!(saw_final);
    }

    #[tokio::test]
    async fn seeding_then_rebuilding_is_idempotent() {
        let engine = engine_with_mock(MockProvider::new("mock-1"));
        engine.seed_history(
            "s1",
            &[CoreMessage::user("a"), CoreMessage::assistant("b"), CoreMessage::tool("ran ls"), CoreMessage::system("injected")],
        );
        let first = engine.history("s1");
        assert_eq!(first.len(), 2);
        engine.seed_history("s1", &first);
        let second = engine.history("s1");
        assert_eq!(first.len(), second.len());
        assert!(second.iter().all(|m| m.is_persistable()));
    }

    #[tokio::test]
    async fn interrupt_cancels_the_in_flight_turn() {
        let engine = engine_with_mock(MockProvider::new("mock-1"));
        let eq = EventQueue::new();
        let submission = user_input("s1", "hello");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine.run_turn(&submission, &eq, cancel).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("interrupted"));
    }
}
