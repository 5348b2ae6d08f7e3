// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::types::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// `complete(ctx, prompt) → final_text` and a streaming form yielding chunks
/// plus a terminal signal (§6). Errors are surfaced verbatim to the caller,
/// which is responsible for the retry policy in §7 item 3.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model_name(&self) -> &str;

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}
