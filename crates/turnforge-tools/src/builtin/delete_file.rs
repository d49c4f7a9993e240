// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::policy::AgentMode;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a single file. Fails gracefully if not found. NEVER delete without explicit user request.\n\
         Permanent — no recovery. For directories use run_terminal_command with rm -r."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to delete"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    fn modes(&self) -> &[AgentMode] {
        &[AgentMode::Agent]
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => {
                let args_preview =
                    serde_json::to_string(&call.args).unwrap_or_else(|_| "null".to_string());
                return ToolOutput::err(
                    &call.id,
                    format!(
                        "missing required parameter 'path'. Received: {}",
                        args_preview
                    ),
                );
            }
        };

        debug!(path = %path, "delete_file tool");

        // Refuse to delete directories
        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_dir() => {
                return ToolOutput::err(
                    &call.id,
                    format!(
                        "{path} is a directory; use run_terminal_command with 'rm -rf' instead"
                    ),
                );
            }
            Err(e) => return ToolOutput::err(&call.id, format!("stat error: {e}")),
            Ok(_) => {}
        }

        match tokio::fs::remove_file(&path).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("deleted {path}")),
            Err(e) => ToolOutput::err(&call.id, format!("delete error: {e}")),
        }
    }
}
