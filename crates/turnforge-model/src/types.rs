// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Descriptor for one attachment carried on a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub attachment_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub url: String,
}

/// A tool specification as advertised to the provider (builtin + MCP, merged).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub title: Option<String>,
    pub description: String,
    pub input_schema: Value,
}

/// A tool call the provider asked to run, and the paired result fed back on
/// the next round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderToolRequest {
    pub name: String,
    pub call_id: Option<String>,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderToolResult {
    pub name: String,
    pub call_id: Option<String>,
    pub ok: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// One round's request to the provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub session_id: String,
    pub user_id: String,
    pub provider: String,
    pub model: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    pub mcp_enabled: bool,
    pub mcp_profile_name: Option<String>,
    pub summaries: String,
    #[serde(default)]
    pub tool_specs: Vec<ToolSpec>,
    #[serde(default)]
    pub tool_results: Vec<ProviderToolResult>,
    pub tool_call_round: u32,
}

/// The provider's reply for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    #[serde(default)]
    pub output_text: String,
    #[serde(default)]
    pub decision_summary: String,
    #[serde(default)]
    pub tool_requests: Vec<ProviderToolRequest>,
}
