// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{ModelProvider, ResponseStream};
use crate::types::{
    CompletionRequest, ContentPart, FunctionCall, Message, MessageContent, ResponseEvent, Role,
    ToolResultContent, Usage,
};

/// Anthropic-compatible HTTP transport (§6: "the concrete HTTP transport to
/// the model provider" is a collaborator, not core — this is the one
/// concrete implementation the core ships with).
pub struct AnthropicProvider {
    model: String,
    auth_token: Option<String>,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model: impl Into<String>, auth_token: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            auth_token,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            max_tokens: 4096,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_body(&self, req: &CompletionRequest) -> Value {
        let mut system_text = String::new();
        let mut messages = Vec::new();

        for msg in &req.messages {
            match (&msg.role, &msg.content) {
                (Role::System, MessageContent::Text(t)) => {
                    if !system_text.is_empty() {
                        system_text.push('\n');
                    }
                    system_text.push_str(t);
                }
                (Role::User, MessageContent::Text(t)) => {
                    messages.push(json!({ "role": "user", "content": t }));
                }
                (Role::User, MessageContent::ContentParts(parts)) => {
                    let content: Vec<Value> = parts.iter().map(content_part_to_json).collect();
                    messages.push(json!({ "role": "user", "content": content }));
                }
                (Role::Assistant, MessageContent::Text(t)) => {
                    messages.push(json!({ "role": "assistant", "content": t }));
                }
                (Role::Assistant, MessageContent::ToolCall { tool_call_id, function }) => {
                    let args: Value = serde_json::from_str(&function.arguments).unwrap_or(json!({}));
                    messages.push(json!({
                        "role": "assistant",
                        "content": [{
                            "type": "tool_use",
                            "id": tool_call_id,
                            "name": function.name,
                            "input": args,
                        }],
                    }));
                }
                (Role::Tool, MessageContent::ToolResult { tool_call_id, content }) => {
                    let content_json = match content {
                        ToolResultContent::Text(t) => json!(t),
                        ToolResultContent::Parts(parts) => json!(parts
                            .iter()
                            .map(|p| match p {
                                crate::types::ToolContentPart::Text { text } => json!({ "type": "text", "text": text }),
                                crate::types::ToolContentPart::Image { image_url } => json!({
                                    "type": "image",
                                    "source": { "type": "url", "url": image_url },
                                }),
                            })
                            .collect::<Vec<_>>()),
                    };
                    messages.push(json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": tool_call_id,
                            "content": content_json,
                        }],
                    }));
                }
                _ => {}
            }
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
            "stream": true,
        });
        if !system_text.is_empty() {
            body["system"] = json!(system_text);
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.parameters }))
                .collect();
            body["tools"] = json!(tools);
        }
        body
    }
}

fn content_part_to_json(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({ "type": "text", "text": text }),
        ContentPart::Image { image_url, .. } => {
            json!({ "type": "image", "source": { "type": "url", "url": image_url } })
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let token = self.auth_token.as_deref().context("no auth token configured")?;
        let body = self.build_body(&req);

        debug!(model = %self.model, "sending anthropic request");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", token)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("anthropic request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("anthropic error {status}: {text}");
        }

        // SSE lines can split across TCP chunks; carry a remainder buffer
        // forward and only parse complete, newline-terminated lines.
        let byte_stream = resp.bytes_stream();
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let text = match chunk {
                    Ok(b) => String::from_utf8_lossy(&b).to_string(),
                    Err(e) => return futures::future::ready(Some(vec![Err(anyhow::anyhow!(e))])),
                };
                buf.push_str(&text);
                let mut events = Vec::new();
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    if let Some(data) = line.strip_prefix("data: ") {
                        if let Ok(v) = serde_json::from_str::<Value>(data.trim()) {
                            if let Some(ev) = parse_event(&v) {
                                events.push(Ok(ev));
                            }
                        }
                    }
                }
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

fn parse_event(v: &Value) -> Option<ResponseEvent> {
    match v["type"].as_str()? {
        "content_block_delta" => {
            let delta = &v["delta"];
            match delta["type"].as_str()? {
                "text_delta" => Some(ResponseEvent::TextDelta(delta["text"].as_str().unwrap_or("").to_string())),
                "input_json_delta" => Some(ResponseEvent::ToolCall {
                    id: String::new(),
                    name: String::new(),
                    arguments: delta["partial_json"].as_str().unwrap_or("").to_string(),
                }),
                _ => None,
            }
        }
        "content_block_start" => {
            let block = &v["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                Some(ResponseEvent::ToolCall {
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: String::new(),
                })
            } else {
                None
            }
        }
        "message_delta" => {
            let usage = &v["usage"];
            if usage.is_object() {
                Some(ResponseEvent::Usage(Usage {
                    input_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32,
                    output_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as u32,
                    cache_read_tokens: usage["cache_read_input_tokens"].as_u64().unwrap_or(0) as u32,
                    cache_write_tokens: usage["cache_creation_input_tokens"].as_u64().unwrap_or(0) as u32,
                }))
            } else {
                None
            }
        }
        "message_stop" => Some(ResponseEvent::Done),
        "error" => Some(ResponseEvent::Error(v["error"]["message"].as_str().unwrap_or("unknown error").to_string())),
        _ => None,
    }
}

// Only exercises the pure parsing path; the network path is covered by
// `MockProvider` in the rest of the suite (no live credentials in CI).
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_event_parses() {
        let v = json!({ "type": "content_block_delta", "delta": { "type": "text_delta", "text": "hi" } });
        match parse_event(&v) {
            Some(ResponseEvent::TextDelta(t)) => assert_eq!(t, "hi"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tool_use_start_event_carries_id_and_name() {
        let v = json!({
            "type": "content_block_start",
            "content_block": { "type": "tool_use", "id": "call_1", "name": "command" },
        });
        match parse_event(&v) {
            Some(ResponseEvent::ToolCall { id, name, .. }) => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "command");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn message_stop_is_done() {
        let v = json!({ "type": "message_stop" });
        assert!(matches!(parse_event(&v), Some(ResponseEvent::Done)));
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        let v = json!({ "type": "ping" });
        assert!(parse_event(&v).is_none());
    }

    #[test]
    fn build_body_separates_system_text_from_messages() {
        let provider = AnthropicProvider::new("claude-x", Some("tok".into()), None);
        let req = CompletionRequest {
            messages: vec![Message::system("be terse"), Message::user("hi")],
            tools: vec![],
            stream: true,
        };
        let body = provider.build_body(&req);
        assert_eq!(body["system"], json!("be terse"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }
}
