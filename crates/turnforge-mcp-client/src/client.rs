// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! JSON-RPC 2.0 over HTTP MCP client (§4.6). The once-per-client handshake
//! is double-checked-locked behind `init_lock`; the monotonic request-id
//! counter and the single mutable `MCP-Session-Id` header each have their
//! own lock. No call ever holds two of the three at once.
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;
use turnforge_model::ToolSpec;

use crate::error::McpError;
use crate::types::rpc::{Request, Response};
use crate::types::McpInitializeResult;

/// Protocol version this client speaks.
pub const PROTOCOL_VERSION: &str = "2025-11-25";

#[async_trait]
pub trait McpClient: Send + Sync {
    async fn ensure_initialized(&self, name: &str, version: &str) -> Result<McpInitializeResult, McpError>;
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, McpError>;
    async fn list_prompts(&self) -> Result<Vec<Value>, McpError>;
    async fn list_resources(&self) -> Result<Vec<Value>, McpError>;
    async fn list_resource_templates(&self) -> Result<Vec<Value>, McpError>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError>;
}

pub struct JsonRpcMcpClient {
    server_url: Option<String>,
    server_token: Option<String>,
    http: reqwest::Client,
    init_lock: AsyncMutex<Option<McpInitializeResult>>,
    request_id: AtomicU64,
    session_id_lock: StdMutex<Option<String>>,
}

impl JsonRpcMcpClient {
    pub fn new(server_url: Option<String>, server_token: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            server_url,
            server_token,
            http,
            init_lock: AsyncMutex::new(None),
            request_id: AtomicU64::new(0),
            session_id_lock: StdMutex::new(None),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn session_id(&self) -> Option<String> {
        self.session_id_lock.lock().unwrap().clone()
    }

    fn set_session_id(&self, id: Option<String>) {
        if id.is_some() {
            *self.session_id_lock.lock().unwrap() = id;
        }
    }

    fn protocol_version(&self) -> Option<String> {
        self.init_lock
            .try_lock()
            .ok()
            .and_then(|g| g.as_ref().and_then(|r| r.protocol_version.clone()))
    }

    /// Sends one JSON-RPC call (`id` present) and returns its `result`.
    /// `bare` suppresses the protocol-version/session-id headers, used only
    /// for the initial `initialize` call.
    async fn call(&self, method: &str, params: Value, bare: bool) -> Result<Value, McpError> {
        let base = self
            .server_url
            .as_deref()
            .ok_or_else(|| McpError::Configuration("mcp server_url not configured".into()))?;

        let id = self.next_request_id();
        let body = Request {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };

        let mut req = self
            .http
            .post(base)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");
        if let Some(token) = &self.server_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        if !bare {
            if let Some(pv) = self.protocol_version() {
                req = req.header("MCP-Protocol-Version", pv);
            }
            if let Some(sid) = self.session_id() {
                req = req.header("MCP-Session-Id", sid);
            }
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| McpError::UpstreamTransient(format!("mcp request failed: {e}")))?;

        if let Some(sid) = response
            .headers()
            .get("MCP-Session-Id")
            .and_then(|v| v.to_str().ok())
        {
            self.set_session_id(Some(sid.to_string()));
        }

        if response.status().is_server_error() {
            return Err(McpError::UpstreamTransient(format!(
                "mcp server returned {}",
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| McpError::UpstreamTransient(format!("mcp response not valid json: {e}")))?;
        if !value.is_object() {
            return Err(McpError::UpstreamTransient("mcp response body is not an object".into()));
        }
        let parsed: Response = serde_json::from_value(value)
            .map_err(|e| McpError::UpstreamTransient(format!("mcp response malformed: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(McpError::UpstreamTransient(err.message));
        }
        parsed
            .result
            .ok_or_else(|| McpError::UpstreamTransient("mcp response missing result".into()))
    }

    /// Fire-and-forget notification: no `id`, response body ignored.
    async fn notify(&self, method: &str, params: Value) -> Result<(), McpError> {
        let base = self
            .server_url
            .as_deref()
            .ok_or_else(|| McpError::Configuration("mcp server_url not configured".into()))?;
        let body = Request {
            jsonrpc: "2.0",
            id: None,
            method,
            params,
        };
        let mut req = self
            .http
            .post(base)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");
        if let Some(token) = &self.server_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(pv) = self.protocol_version() {
            req = req.header("MCP-Protocol-Version", pv);
        }
        if let Some(sid) = self.session_id() {
            req = req.header("MCP-Session-Id", sid);
        }
        let _ = req.json(&body).send().await;
        Ok(())
    }

    async fn do_initialize(&self, name: &str, version: &str) -> Result<McpInitializeResult, McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": name, "version": version },
        });
        let result = self.call("initialize", params, true).await?;

        let server_capabilities = result.get("capabilities").cloned().unwrap_or(Value::Null);
        let protocol_version = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .map(str::to_string);
        let server_info = result.get("serverInfo");
        let server_name = server_info
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let server_version = server_info
            .and_then(|s| s.get("version"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let instructions = result
            .get("instructions")
            .and_then(Value::as_str)
            .map(str::to_string);

        let init = McpInitializeResult {
            server_name,
            server_version,
            protocol_version,
            server_capabilities,
            instructions,
            session_id: self.session_id(),
        };

        let _ = self.notify("notifications/initialized", json!({})).await;
        Ok(init)
    }

    /// Consumes `nextCursor` pagination for a listing method, collecting
    /// `items_key` array entries across pages. Raises `UpstreamTransient` if
    /// a cursor repeats (cycle).
    async fn list_paginated(&self, method: &str, items_key: &str) -> Result<Vec<Value>, McpError> {
        let mut items = Vec::new();
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = json!({});
            if let Some(c) = &cursor {
                params["cursor"] = json!(c);
            }
            let result = self.call(method, params, false).await?;
            if let Some(page) = result.get(items_key).and_then(Value::as_array) {
                items.extend(page.iter().cloned());
            }
            match result.get("nextCursor").and_then(Value::as_str) {
                Some(next) if !next.is_empty() => {
                    if !seen_cursors.insert(next.to_string()) {
                        return Err(McpError::UpstreamTransient(format!(
                            "mcp pagination cycle detected at cursor {next}"
                        )));
                    }
                    cursor = Some(next.to_string());
                }
                _ => break,
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl McpClient for JsonRpcMcpClient {
    async fn ensure_initialized(&self, name: &str, version: &str) -> Result<McpInitializeResult, McpError> {
        {
            let guard = self.init_lock.lock().await;
            if let Some(cached) = guard.as_ref() {
                return Ok(cached.clone());
            }
        }
        let mut guard = self.init_lock.lock().await;
        if let Some(cached) = guard.as_ref() {
            return Ok(cached.clone());
        }
        let result = self.do_initialize(name, version).await?;
        *guard = Some(result.clone());
        Ok(result)
    }

    async fn list_tools(&self) -> Result<Vec<ToolSpec>, McpError> {
        let raw = self.list_paginated("tools/list", "tools").await?;
        Ok(raw
            .into_iter()
            .filter_map(|v| {
                let name = v.get("name")?.as_str()?.to_string();
                let description = v
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let title = v.get("title").and_then(Value::as_str).map(str::to_string);
                let input_schema = v.get("inputSchema").cloned().unwrap_or_else(|| json!({}));
                Some(ToolSpec {
                    name,
                    title,
                    description,
                    input_schema,
                })
            })
            .collect())
    }

    async fn list_prompts(&self) -> Result<Vec<Value>, McpError> {
        self.list_paginated("prompts/list", "prompts").await
    }

    async fn list_resources(&self) -> Result<Vec<Value>, McpError> {
        self.list_paginated("resources/list", "resources").await
    }

    async fn list_resource_templates(&self) -> Result<Vec<Value>, McpError> {
        self.list_paginated("resources/templates/list", "resourceTemplates")
            .await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.call("tools/call", json!({ "name": name, "arguments": arguments }), false)
            .await
    }
}
