// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use echo_types::{ToolCall, ToolKind, ToolResult};

use crate::policy::ApprovalPolicy;
use crate::tool::{ProgressSink, ToolHandler};

/// A pure signal: no I/O. The caller (the execution engine) is responsible
/// for emitting the `plan.updated` event from the call's `args`; this
/// handler only validates shape and echoes success (§4.4).
pub struct UpdatePlanHandler;

#[async_trait]
impl ToolHandler for UpdatePlanHandler {
    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, call: &ToolCall, _progress: &dyn ProgressSink) -> anyhow::Result<ToolResult> {
        let plan = call
            .args
            .get("plan")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("missing 'plan' array"))?;

        Ok(ToolResult::ok(&call.id, ToolKind::UpdatePlan, format!("{} step(s) recorded", plan.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::NoopProgressSink;
    use serde_json::json;

    #[tokio::test]
    async fn accepts_a_well_formed_plan() {
        let handler = UpdatePlanHandler;
        let mut call = ToolCall::new("1", ToolKind::UpdatePlan);
        call.args = json!({ "plan": [{"step": "a", "status": "pending"}] });
        let result = handler.execute(&call, &NoopProgressSink).await.unwrap();
        assert_eq!(result.status, echo_types::ToolStatus::Completed);
    }

    #[tokio::test]
    async fn rejects_missing_plan_field() {
        let handler = UpdatePlanHandler;
        let call = ToolCall::new("1", ToolKind::UpdatePlan);
        assert!(handler.execute(&call, &NoopProgressSink).await.is_err());
    }
}
