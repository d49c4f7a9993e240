// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::policy::ApprovalPolicy;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const DEFAULT_MAX_BYTES: usize = 1_000_000;

/// Fetches a URL over HTTP(S) and returns the body as text, truncated to
/// `max_bytes`. GET or POST only; redirects are followed up to a fixed cap.
pub struct WebFetchTool {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetches text content from an HTTP(S) URL: web pages, API responses, remote files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch; must start with http:// or https://"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST"],
                    "description": "HTTP method (default GET)"
                },
                "headers": {
                    "type": "object",
                    "description": "Extra HTTP headers",
                    "additionalProperties": { "type": "string" }
                },
                "body": {
                    "type": "string",
                    "description": "Request body, sent only when method is POST"
                }
            },
            "required": ["url"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(url) = call.args.get("url").and_then(Value::as_str).map(str::trim) else {
            return ToolOutput::err(&call.id, "'url' parameter is required");
        };
        if url.is_empty() {
            return ToolOutput::err(&call.id, "'url' parameter is required");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return ToolOutput::err(&call.id, "'url' must start with http:// or https://");
        }

        let method = call.args.get("method").and_then(Value::as_str).unwrap_or("GET");
        if method != "GET" && method != "POST" {
            return ToolOutput::err(&call.id, "'method' must be GET or POST");
        }

        let body = call.args.get("body").and_then(Value::as_str).map(str::to_string);
        let extra_headers: Vec<(String, String)> = call
            .args
            .get("headers")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let client = match reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
        {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, format!("failed to build HTTP client: {e}")),
        };

        let mut builder = if method == "POST" {
            client.post(url)
        } else {
            client.get(url)
        };
        for (k, v) in extra_headers {
            builder = builder.header(k, v);
        }
        if method == "POST" {
            if let Some(b) = body {
                builder = builder.body(b);
            }
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return ToolOutput::err(&call.id, "request timed out"),
            Err(e) => return ToolOutput::err(&call.id, format!("HTTP error: {e}")),
        };

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return ToolOutput::err(&call.id, format!("failed to read response body: {e}")),
        };
        let byte_count = bytes.len();
        let truncated = byte_count > self.max_bytes;
        let text = String::from_utf8_lossy(&bytes[..byte_count.min(self.max_bytes)]).into_owned();

        ToolOutput::ok_with_metadata(
            &call.id,
            text,
            json!({
                "status_code": status_code,
                "content_type": content_type,
                "byte_count": byte_count,
                "truncated": truncated,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "w1".into(),
            name: "web_fetch".into(),
            args,
        }
    }

    #[tokio::test]
    async fn missing_url_is_error() {
        let out = WebFetchTool::default().execute(&call(json!({}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let out = WebFetchTool::default()
            .execute(&call(json!({ "url": "ftp://example.com" })))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("http"));
    }

    #[tokio::test]
    async fn rejects_unsupported_method() {
        let out = WebFetchTool::default()
            .execute(&call(json!({ "url": "https://example.com", "method": "DELETE" })))
            .await;
        assert!(out.is_error);
    }
}
