// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::hashline::format_hashline;
use crate::{Tool, ToolCall, ToolOutput};

const DEFAULT_MAX_LINES: usize = 2000;

/// Reads a file and renders it in hashline format so the edit tool can
/// anchor on content rather than raw line numbers. `ToolRegistry::call`
/// records the file's mtime on a successful read, satisfying the
/// read-before-edit contract (§4.5) — this tool itself holds no state.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file and return its contents in hashline format \
         (`lineno:hash| content`), optionally windowed by offset/limit."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute or workspace-relative path"},
                "offset": {"type": "integer", "description": "1-indexed first line to return", "minimum": 1},
                "limit": {"type": "integer", "description": "Maximum number of lines to return", "minimum": 1}
            },
            "required": ["path"]
        })
    }

    fn output_category(&self) -> crate::tool::OutputCategory {
        crate::tool::OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(path_str) = call.args.get("path").and_then(Value::as_str) else {
            return ToolOutput::err(&call.id, "missing required argument: path");
        };
        let path = Path::new(path_str);

        let offset = call
            .args
            .get("offset")
            .and_then(Value::as_u64)
            .unwrap_or(1)
            .max(1) as usize;
        let limit = call
            .args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_LINES);

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => return ToolOutput::err(&call.id, format!("cannot read {path_str}: {e}")),
        };

        if bytes.iter().take(8000).any(|&b| b == 0) {
            return ToolOutput::err(
                &call.id,
                format!("{path_str} appears to be a binary file; refusing to read as text"),
            );
        }

        let text = String::from_utf8_lossy(&bytes);
        let all_lines: Vec<&str> = text.lines().collect();
        let total = all_lines.len();

        let start = (offset - 1).min(total);
        let end = start.saturating_add(limit).min(total);

        let mut rendered = String::new();
        for (i, line) in all_lines[start..end].iter().enumerate() {
            if i > 0 {
                rendered.push('\n');
            }
            rendered.push_str(&format_hashline(start + i + 1, line));
        }
        if end < total {
            rendered.push_str(&format!(
                "\n... ({} more lines not shown; increase limit or offset to continue)",
                total - end
            ));
        }

        ToolOutput::ok_with_metadata(
            &call.id,
            rendered,
            json!({ "total_lines": total, "returned_lines": end - start }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolRegistry;

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "c1".into(),
            name: "read_file".into(),
            args,
        }
    }

    #[tokio::test]
    async fn reads_file_in_hashline_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "first\nsecond\n").unwrap();
        let tool = ReadFileTool;
        let out = tool
            .execute(&call(json!({"path": path.to_str().unwrap()})))
            .await;
        assert!(!out.is_error);
        let lines: Vec<&str> = out.content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1:"));
        assert!(lines[0].contains("| first"));
        assert!(lines[1].starts_with("2:"));
    }

    #[tokio::test]
    async fn records_mtime_for_read_before_edit_via_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hi\n").unwrap();
        let mut reg = ToolRegistry::new();
        reg.register(ReadFileTool);
        reg.call(&call(json!({"path": path.to_str().unwrap()}))).await;
        assert!(reg.check_file_edit_allowed(&path).is_none());
    }

    #[tokio::test]
    async fn missing_file_is_error() {
        let tool = ReadFileTool;
        let out = tool
            .execute(&call(json!({"path": "/nonexistent/path/xyz"})))
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn offset_and_limit_window_the_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "l1\nl2\nl3\nl4\nl5\n").unwrap();
        let tool = ReadFileTool;
        let out = tool
            .execute(&call(json!({"path": path.to_str().unwrap(), "offset": 2, "limit": 2})))
            .await;
        let lines: Vec<&str> = out.content.lines().filter(|l| l.contains('|')).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2:"));
        assert!(lines[1].starts_with("3:"));
    }
}
