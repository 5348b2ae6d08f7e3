// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::stream;

use crate::provider::{ModelProvider, ResponseStream};
use crate::types::{CompletionRequest, MessageContent, ResponseEvent, Role, Usage};

/// Deterministic echo model backing the seed tests of §8.
///
/// Without a scripted tool call it replies `"assistant: {last user text}"`.
/// With one queued via [`MockProvider::with_tool_call`], the *first* call
/// emits that tool call instead of text; subsequent calls fall back to the
/// echo reply so the turn can terminate.
pub struct MockProvider {
    model: String,
    scripted_tool_call: Option<(String, String, String)>,
}

impl MockProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), scripted_tool_call: None }
    }

    /// `(id, name, json_arguments)` — emitted on the next `complete` call only.
    pub fn with_tool_call(mut self, id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        self.scripted_tool_call = Some((id.into(), name.into(), arguments.into()));
        self
    }
}

fn last_user_text(req: &CompletionRequest) -> String {
    req.messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .and_then(|m| match &m.content {
            MessageContent::Text(t) => Some(t.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let text = last_user_text(&req);
        let input_tokens = text.split_whitespace().count().max(1) as u32;

        let events: Vec<anyhow::Result<ResponseEvent>> = if let Some((id, name, args)) = &self.scripted_tool_call {
            vec![
                Ok(ResponseEvent::ToolCall { id: id.clone(), name: name.clone(), arguments: args.clone() }),
                Ok(ResponseEvent::Usage(Usage { input_tokens, output_tokens: 0, cache_read_tokens: 0, cache_write_tokens: 0 })),
                Ok(ResponseEvent::Done),
            ]
        } else {
            let reply = format!("assistant: {text}");
            let output_tokens = reply.split_whitespace().count().max(1) as u32;
            vec![
                Ok(ResponseEvent::TextDelta(reply)),
                Ok(ResponseEvent::Usage(Usage { input_tokens, output_tokens, cache_read_tokens: 0, cache_write_tokens: 0 })),
                Ok(ResponseEvent::Done),
            ]
        };

        Ok(Box::pin(stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use futures::StreamExt;

    #[tokio::test]
    async fn echoes_last_user_text() {
        let provider = MockProvider::new("mock-1");
        let req = CompletionRequest { messages: vec![Message::user("hello")], tools: vec![], stream: true };
        let mut stream = provider.complete(req).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        match first {
            ResponseEvent::TextDelta(t) => assert_eq!(t, "assistant: hello"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn scripted_tool_call_is_emitted_instead_of_text() {
        let provider = MockProvider::new("mock-1").with_tool_call("c1", "command", r#"{"command":"echo hi"}"#);
        let req = CompletionRequest { messages: vec![Message::user("do it")], tools: vec![], stream: true };
        let mut stream = provider.complete(req).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        match first {
            ResponseEvent::ToolCall { id, name, .. } => {
                assert_eq!(id, "c1");
                assert_eq!(name, "command");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

impl std::fmt::Debug for ResponseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseEvent::TextDelta(t) => write!(f, "TextDelta({t:?})"),
            ResponseEvent::ToolCall { id, name, .. } => write!(f, "ToolCall({id}, {name})"),
            ResponseEvent::Usage(u) => write!(f, "Usage({u:?})"),
            ResponseEvent::Done => write!(f, "Done"),
            ResponseEvent::Error(e) => write!(f, "Error({e})"),
        }
    }
}
