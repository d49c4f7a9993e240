// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::{Tool, ToolCall, ToolOutput};

/// A tool schema exposed to providers (builtin + merged MCP specs share this
/// shape one level up, in `turnforge-core`).
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub title: Option<String>,
    pub description: String,
    pub parameters: Value,
}

/// Central registry holding all available built-in tools, plus the
/// read-before-edit bookkeeping the hashline edit tool depends on.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    read_mtimes: Mutex<HashMap<PathBuf, std::time::SystemTime>>,
}

// SAFETY: ToolRegistry is Sync because:
// - HashMap<String, Arc<dyn Tool>> is Sync (String is Sync, Arc<T: Send + Sync> is Sync)
// - Tools implement Send + Sync (required by the Tool trait)
// - read_mtimes is a Mutex, which is Sync regardless of its contents
// - No interior mutability exists outside that Mutex after construction
unsafe impl Sync for ToolRegistry {}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            read_mtimes: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn to_provider_specs(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                title: t.title().map(str::to_string),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute a registered tool. Unknown name or a panicking/failing tool
    /// both surface as an error `ToolOutput` — callers never see a raised
    /// exception from here.
    ///
    /// `edit_file` is gated here rather than inside the tool itself: the
    /// registry owns `read_mtimes`, so the read-before-edit check (§4.5) and
    /// the post-read bookkeeping both live at this single seam instead of
    /// requiring every tool to hold a back-reference to its own registry.
    pub async fn call(&self, call: &ToolCall) -> ToolOutput {
        if call.name == "edit_file" {
            if let Some(path) = call.args.get("path").and_then(Value::as_str) {
                if let Some(denial) = self.check_file_edit_allowed(Path::new(path)) {
                    return ToolOutput::err(&call.id, denial);
                }
            }
        }
        let result = match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call).await,
            None => return ToolOutput::err(&call.id, "not registered"),
        };
        if !result.is_error && (call.name == "read_file" || call.name == "edit_file") {
            if let Some(path) = call.args.get("path").and_then(Value::as_str) {
                self.notify_file_read(Path::new(path));
            }
        }
        result
    }

    /// Record that `path` was freshly read, for the read-before-edit check.
    pub fn notify_file_read(&self, path: &Path) {
        if let Ok(meta) = std::fs::metadata(path) {
            if let Ok(mtime) = meta.modified() {
                self.read_mtimes
                    .lock()
                    .unwrap()
                    .insert(path.to_path_buf(), mtime);
            }
        }
    }

    /// Returns `Some(denial message)` if `path` may not be edited right now,
    /// `None` if the edit is allowed.
    pub fn check_file_edit_allowed(&self, path: &Path) -> Option<String> {
        let recorded = self.read_mtimes.lock().unwrap().get(path).copied();
        let Some(recorded) = recorded else {
            return Some(format!(
                "file_read required before editing {}: no prior read recorded",
                path.display()
            ));
        };
        let current = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(e) => return Some(format!("cannot stat {}: {e}", path.display())),
        };
        if current > recorded {
            return Some(format!(
                "file_read required before editing {}: file changed since last read",
                path.display()
            ));
        }
        None
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use std::io::Write;

    use super::*;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, format!("echo:{}", call.args))
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" });
        assert!(reg.get("echo").is_some());
    }

    #[tokio::test]
    async fn call_unknown_tool_is_not_registered_error() {
        let reg = ToolRegistry::new();
        let call = ToolCall {
            id: "x".into(),
            name: "missing".into(),
            args: json!({}),
        };
        let out = reg.call(&call).await;
        assert!(out.is_error);
        assert_eq!(out.content, "not registered");
    }

    #[test]
    fn edit_denied_without_prior_read() {
        let reg = ToolRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "hi").unwrap();
        let denial = reg.check_file_edit_allowed(&path);
        assert!(denial.is_some());
        assert!(denial.unwrap().contains("file_read"));
    }

    #[test]
    fn edit_allowed_after_read_with_unchanged_mtime() {
        let reg = ToolRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "hi").unwrap();
        reg.notify_file_read(&path);
        assert!(reg.check_file_edit_allowed(&path).is_none());
    }

    #[test]
    fn edit_denied_when_file_changed_after_read() {
        let reg = ToolRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "hi").unwrap();
        reg.notify_file_read(&path);

        // Sleep past typical filesystem mtime resolution, then rewrite.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b" more").unwrap();
        drop(f);

        let denial = reg.check_file_edit_allowed(&path);
        assert!(denial.is_some());
    }
}
