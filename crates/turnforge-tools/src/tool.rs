// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

use crate::policy::{AgentMode, ApprovalPolicy};

/// How a tool's output should be truncated when it runs long. Distinct
/// categories get distinct truncation strategies upstream (head/tail for
/// terminal output, keep-latest for match lists, ...); tools that don't
/// override `output_category` fall back to a flat byte/line cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCategory {
    /// Generic text, truncated with a flat cap.
    Generic,
    /// Terminal / process output: keep head and tail, drop the middle.
    HeadTail,
    /// An ordered list of matches (grep, search): keep as many whole
    /// entries as fit rather than cutting mid-entry.
    MatchList,
    /// File contents rendered in hashline format.
    FileContent,
}

/// One piece of a tool's structured output, for tools that return more than
/// a flat string (currently unused by any builtin but kept as the shape the
/// provider envelope expects for forward compatibility with richer tools).
#[derive(Debug, Clone)]
pub struct ToolOutputPart {
    pub label: String,
    pub content: String,
}

/// A single tool invocation requested by the provider.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier supplied by the provider (forwarded verbatim).
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
    /// Extra structured fields merged into the `result` object returned to
    /// the provider on success (ignored on error).
    pub metadata: Value,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
            metadata: Value::Null,
        }
    }

    pub fn ok_with_metadata(
        call_id: impl Into<String>,
        content: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
            metadata,
        }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: msg.into(),
            is_error: true,
            metadata: Value::Null,
        }
    }
}

/// Trait every built-in tool implements. Execution must never panic on bad
/// input — wrap failures in [`ToolOutput::err`] so the registry's `call`
/// contract (unknown tool and thrown-exception both become a `ToolResult`)
/// holds uniformly.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn title(&self) -> Option<&str> {
        None
    }
    /// JSON Schema for the tool's arguments.
    fn parameters_schema(&self) -> Value;
    /// Approval policy a gateway-side confirmation layer should apply before
    /// dispatching this tool. The core registry itself never consults this —
    /// read-before-edit (§4.5) is the only sandboxing rule it enforces — but
    /// tools still declare their policy so an operator-facing approval layer
    /// has something to key off of.
    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }
    /// Agent modes this tool is available in. Mutating tools restrict
    /// themselves to `Agent` mode.
    fn modes(&self) -> &[AgentMode] {
        &[AgentMode::Agent]
    }
    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_sets_content_and_clears_error() {
        let out = ToolOutput::ok("1", "done");
        assert_eq!(out.content, "done");
        assert!(!out.is_error);
    }

    #[test]
    fn err_sets_is_error() {
        let out = ToolOutput::err("1", "boom");
        assert!(out.is_error);
        assert_eq!(out.content, "boom");
    }

    #[test]
    fn ok_with_metadata_carries_value() {
        let out = ToolOutput::ok_with_metadata("1", "done", json!({"lines": 3}));
        assert_eq!(out.metadata["lines"], 3);
    }
}
