// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Context-window budget management (§4.5 AMBIENT): proactive,
//! model-assisted summarization tried first, a deterministic drop as the
//! emergency fallback. Grounded on `sven-core::compact`'s
//! `compact_session`/`emergency_compact` pair, narrowed to the single
//! narrative strategy this spec calls for (the teacher's structured
//! checkpoint strategy and `smart_truncate` tool-output truncation have no
//! counterpart here — tool output truncation is the renderer's concern,
//! per §4.4).

use std::sync::Arc;

use echo_types::{Message as CoreMessage, Role as CoreRole};
use futures::StreamExt;

const SUMMARIZE_PROMPT: &str =
    "You are a context compaction assistant. Summarise the following conversation history \
     in a concise, information-dense way. Preserve all technical details, decisions, file \
     names, and requirements that may be relevant to future work. The summary will replace \
     the original history to free up context space.";

const EMERGENCY_NOTICE: &str = "[Context emergency-compacted: earlier history was dropped to \
     prevent a context-window overflow. Ask the user to re-provide any missing requirements \
     if needed.]";

fn serialize_history(messages: &[CoreMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                CoreRole::User => "User",
                CoreRole::Assistant => "Assistant",
                CoreRole::System => "System",
                CoreRole::Tool => "Tool",
            };
            format!("{role}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Drops all but the most recent `keep_recent` messages and prepends a
/// canned notice. No model call is made — this always succeeds regardless
/// of history size (§4.5 AMBIENT path c).
pub fn emergency_compact(history: &[CoreMessage], keep_recent: usize) -> Vec<CoreMessage> {
    let tail_start = history.len().saturating_sub(keep_recent);
    let mut kept = vec![CoreMessage::assistant(EMERGENCY_NOTICE)];
    kept.extend(history[tail_start..].iter().cloned());
    kept
}

async fn summarize(provider: &Arc<dyn echo_model::ModelProvider>, text: String) -> Option<String> {
    let request = echo_model::CompletionRequest {
        messages: vec![echo_model::Message::user(format!("{SUMMARIZE_PROMPT}\n\n---\n\n{text}"))],
        tools: vec![],
        stream: true,
    };
    let mut stream = provider.complete(request).await.ok()?;
    let mut summary = String::new();
    while let Some(event) = stream.next().await {
        match event {
            Ok(echo_model::ResponseEvent::TextDelta(chunk)) => summary.push_str(&chunk),
            Ok(echo_model::ResponseEvent::Done) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    (!summary.is_empty()).then_some(summary)
}

/// Asks the model to summarize everything but the most recent `keep_recent`
/// messages, replacing the rest with one synthetic system-role message
/// carrying the summary (§4.5 AMBIENT path b). Falls back to
/// [`emergency_compact`] if the model call errors or returns nothing.
pub async fn compact_history(
    provider: &Arc<dyn echo_model::ModelProvider>,
    history: &[CoreMessage],
    keep_recent: usize,
) -> Vec<CoreMessage> {
    if history.len() <= keep_recent + 1 {
        return history.to_vec();
    }
    let split = history.len().saturating_sub(keep_recent);
    let (old, recent) = history.split_at(split);

    match summarize(provider, serialize_history(old)).await {
        Some(summary) => {
            let mut compacted = vec![CoreMessage::system(summary)];
            compacted.extend(recent.iter().cloned());
            compacted
        }
        None => emergency_compact(history, keep_recent),
    }
}

/// Entry point `ExecutionEngine` calls before assembling a prompt: a no-op
/// under budget, otherwise [`compact_history`].
pub async fn compact_if_needed(
    provider: &Arc<dyn echo_model::ModelProvider>,
    history: &[CoreMessage],
    context_window_tokens: usize,
    threshold: f32,
    keep_recent: usize,
) -> Vec<CoreMessage> {
    let total_chars: usize = history.iter().map(|m| m.content.len()).sum();
    let approx_tokens = (total_chars / 4).max(1);
    let budget = (context_window_tokens as f32 * threshold) as usize;
    if approx_tokens <= budget || history.len() <= keep_recent + 1 {
        return history.to_vec();
    }
    compact_history(provider, history, keep_recent).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_model::MockProvider;

    fn make_history(n: usize) -> Vec<CoreMessage> {
        (0..n)
            .map(|i| if i % 2 == 0 { CoreMessage::user(format!("msg {i}")) } else { CoreMessage::assistant(format!("reply {i}")) })
            .collect()
    }

    #[tokio::test]
    async fn under_budget_is_a_no_op() {
        let provider: Arc<dyn echo_model::ModelProvider> = Arc::new(MockProvider::new("mock-1"));
        let history = make_history(4);
        let result = compact_if_needed(&provider, &history, 1_000_000, 0.85, 6).await;
        assert_eq!(result.len(), 4);
    }

    #[tokio::test]
    async fn over_budget_summarizes_via_the_model_and_keeps_recent_tail() {
        let provider: Arc<dyn echo_model::ModelProvider> = Arc::new(MockProvider::new("mock-1"));
        let history = make_history(20);
        let result = compact_if_needed(&provider, &history, 1, 0.0, 4).await;
        assert_eq!(result[0].role, CoreRole::System);
        assert_eq!(result.len(), 1 + 4);
        assert!(result[0].content.contains("assistant:"));
    }

    #[test]
    fn emergency_compact_keeps_only_the_recent_tail_plus_notice() {
        let history = make_history(10);
        let result = emergency_compact(&history, 3);
        assert_eq!(result.len(), 4);
        assert!(result[0].content.contains("emergency-compacted"));
    }

    #[test]
    fn emergency_compact_preserves_message_order_in_the_tail() {
        let history = make_history(10);
        let result = emergency_compact(&history, 3);
        let tail: Vec<&str> = result[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(tail, vec!["reply 7", "msg 8", "reply 9"]);
    }
}
