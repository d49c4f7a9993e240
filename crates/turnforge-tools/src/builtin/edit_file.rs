// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Hashline-anchored edit tool (§4.5). Locates the line(s) to change by
//! content hash rather than raw line number, so edits survive earlier edits
//! in the same turn shifting line numbers around them.
//!
//! The read-before-edit gate (file must have been read, and not changed
//! since) is enforced by `ToolRegistry::call` before this tool ever runs —
//! by the time `execute` is reached, the edit is already known to be
//! allowed.
use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::hashline::{format_hashline, generate_line_hash, resolve_hash_to_index};
use crate::policy::ApprovalPolicy;
use crate::{Tool, ToolCall, ToolOutput};

/// Lines of context shown before/after the edited range in the post-write
/// preview.
const PREVIEW_CONTEXT: usize = 2;

pub struct EditFileTool;

fn find_matches(lines: &[&str], hash: &str) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, l)| generate_line_hash(l) == hash)
        .map(|(i, _)| i)
        .collect()
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file previously read with read_file, anchoring on the hashline \
         `lineno:hash| content` format it returned. `mode=replace` (default) swaps \
         the inclusive range [start_hash, end_hash] (end_hash defaults to start_hash) \
         for new_content; an empty new_content deletes the range. `mode=insert_after_hash` \
         inserts new_content as new lines immediately after the line matching start_hash. \
         If a hash matches more than one line, start_lineno/end_lineno hints pick the \
         occurrence closest to the given 1-indexed line number; otherwise the first \
         occurrence is used. Requires the file to have been read in this process with \
         no modification since."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute or workspace-relative path"},
                "mode": {"type": "string", "enum": ["replace", "insert_after_hash"], "default": "replace"},
                "start_hash": {"type": "string", "description": "2-hex-digit hashline anchor"},
                "end_hash": {"type": "string", "description": "Defaults to start_hash"},
                "start_lineno": {"type": "integer", "description": "Disambiguation hint (1-indexed)"},
                "end_lineno": {"type": "integer", "description": "Disambiguation hint (1-indexed)"},
                "new_content": {"type": "string", "description": "Replacement text; empty deletes the range"}
            },
            "required": ["path", "start_hash", "new_content"]
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(path_str) = call.args.get("path").and_then(Value::as_str) else {
            return ToolOutput::err(&call.id, "missing required argument: path");
        };
        let Some(start_hash) = call.args.get("start_hash").and_then(Value::as_str) else {
            return ToolOutput::err(&call.id, "missing required argument: start_hash");
        };
        let Some(new_content) = call.args.get("new_content").and_then(Value::as_str) else {
            return ToolOutput::err(&call.id, "missing required argument: new_content");
        };
        let end_hash = call
            .args
            .get("end_hash")
            .and_then(Value::as_str)
            .unwrap_or(start_hash);
        let mode = call
            .args
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or("replace");
        let start_hint = call
            .args
            .get("start_lineno")
            .and_then(Value::as_u64)
            .map(|v| v as usize);
        let end_hint = call
            .args
            .get("end_lineno")
            .and_then(Value::as_u64)
            .map(|v| v as usize);

        let path = Path::new(path_str);

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => return ToolOutput::err(&call.id, format!("cannot read {path_str}: {e}")),
        };
        let text = String::from_utf8_lossy(&bytes).to_string();
        // Preserve a trailing newline if the original file had one.
        let had_trailing_newline = text.ends_with('\n');
        let mut lines: Vec<&str> = text.lines().collect();

        let start_matches = find_matches(&lines, start_hash);
        let Some(start_idx) = resolve_hash_to_index(&start_matches, start_hint) else {
            return ToolOutput::err(
                &call.id,
                format!("start_hash {start_hash} did not match any line"),
            );
        };

        let new_lines: Vec<&str> = if new_content.is_empty() {
            Vec::new()
        } else {
            new_content.lines().collect()
        };

        let (range_start, range_end) = if mode == "insert_after_hash" {
            (start_idx + 1, start_idx) // empty inclusive range right after start_idx
        } else {
            let end_matches = find_matches(&lines, end_hash);
            let Some(raw_end_idx) = resolve_hash_to_index(&end_matches, end_hint) else {
                return ToolOutput::err(
                    &call.id,
                    format!("end_hash {end_hash} did not match any line"),
                );
            };
            if raw_end_idx < start_idx {
                (raw_end_idx, start_idx)
            } else {
                (start_idx, raw_end_idx)
            }
        };

        // Splice [range_start, range_end] inclusive (range_end < range_start means
        // a pure insertion with nothing removed) with new_lines.
        let removed = if range_end >= range_start {
            range_end - range_start + 1
        } else {
            0
        };
        let tail = lines.split_off((range_end + 1).min(lines.len()));
        lines.truncate(range_start.min(lines.len()));
        lines.extend(new_lines.iter().copied());
        let insert_count = new_lines.len();
        lines.extend(tail);

        let mut rendered = lines.join("\n");
        if had_trailing_newline && !rendered.is_empty() {
            rendered.push('\n');
        }
        if let Err(e) = std::fs::write(path, rendered.as_bytes()) {
            return ToolOutput::err(&call.id, format!("cannot write {path_str}: {e}"));
        }

        let preview_lo = range_start.saturating_sub(PREVIEW_CONTEXT);
        let preview_hi = (range_start + insert_count + PREVIEW_CONTEXT).min(lines.len());
        let mut preview = String::new();
        for (i, line) in lines[preview_lo..preview_hi].iter().enumerate() {
            if i > 0 {
                preview.push('\n');
            }
            preview.push_str(&format_hashline(preview_lo + i + 1, line));
        }

        ToolOutput::ok_with_metadata(
            &call.id,
            preview,
            json!({ "lines_removed": removed, "lines_inserted": insert_count }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolRegistry;

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "e1".into(),
            name: "edit_file".into(),
            args,
        }
    }

    fn registry_with_read(path: &Path, content: &str) -> ToolRegistry {
        std::fs::write(path, content).unwrap();
        let mut reg = ToolRegistry::new();
        reg.register(super::super::read_file::ReadFileTool);
        reg.register(EditFileTool);
        reg
    }

    #[tokio::test]
    async fn denied_without_prior_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\n").unwrap();
        let mut reg = ToolRegistry::new();
        reg.register(EditFileTool);
        let out = reg
            .call(&call(json!({
                "path": path.to_str().unwrap(),
                "start_hash": generate_line_hash("one"),
                "new_content": "ONE"
            })))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("file_read"));
    }

    #[tokio::test]
    async fn replace_single_line_after_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let reg = registry_with_read(&path, "one\ntwo\nthree\n");
        reg.notify_file_read(&path);
        let h = generate_line_hash("two");
        let out = reg
            .call(&call(json!({
                "path": path.to_str().unwrap(),
                "start_hash": h,
                "new_content": "TWO"
            })))
            .await;
        assert!(!out.is_error, "{}", out.content);
        let result = std::fs::read_to_string(&path).unwrap();
        assert_eq!(result, "one\nTWO\nthree\n");
    }

    #[tokio::test]
    async fn empty_new_content_deletes_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let reg = registry_with_read(&path, "one\ntwo\nthree\n");
        reg.notify_file_read(&path);
        let h = generate_line_hash("two");
        let out = reg
            .call(&call(json!({
                "path": path.to_str().unwrap(),
                "start_hash": h,
                "new_content": ""
            })))
            .await;
        assert!(!out.is_error, "{}", out.content);
        let result = std::fs::read_to_string(&path).unwrap();
        assert_eq!(result, "one\nthree\n");
    }

    #[tokio::test]
    async fn insert_after_hash_appends_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let reg = registry_with_read(&path, "one\ntwo\n");
        reg.notify_file_read(&path);
        let h = generate_line_hash("one");
        let out = reg
            .call(&call(json!({
                "path": path.to_str().unwrap(),
                "mode": "insert_after_hash",
                "start_hash": h,
                "new_content": "ONE_AND_A_HALF"
            })))
            .await;
        assert!(!out.is_error, "{}", out.content);
        let result = std::fs::read_to_string(&path).unwrap();
        assert_eq!(result, "one\nONE_AND_A_HALF\ntwo\n");
    }

    #[tokio::test]
    async fn ambiguous_hash_uses_lineno_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        // "x" repeated — same hash on every line.
        let reg = registry_with_read(&path, "x\nfiller\nx\n");
        reg.notify_file_read(&path);
        let h = generate_line_hash("x");
        let out = reg
            .call(&call(json!({
                "path": path.to_str().unwrap(),
                "start_hash": h,
                "start_lineno": 3,
                "new_content": "LAST_X"
            })))
            .await;
        assert!(!out.is_error, "{}", out.content);
        let result = std::fs::read_to_string(&path).unwrap();
        assert_eq!(result, "x\nfiller\nLAST_X\n");
    }

    #[tokio::test]
    async fn denied_when_file_changed_since_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let reg = registry_with_read(&path, "one\ntwo\n");
        reg.notify_file_read(&path);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();
        let h = generate_line_hash("two");
        let out = reg
            .call(&call(json!({
                "path": path.to_str().unwrap(),
                "start_hash": h,
                "new_content": "TWO"
            })))
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn unmatched_hash_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let reg = registry_with_read(&path, "one\ntwo\n");
        reg.notify_file_read(&path);
        let out = reg
            .call(&call(json!({
                "path": path.to_str().unwrap(),
                "start_hash": "zz",
                "new_content": "x"
            })))
            .await;
        assert!(out.is_error);
    }
}
