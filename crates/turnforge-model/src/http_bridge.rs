// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::ProviderAdapter;
use crate::types::{ProviderRequest, ProviderResponse, ProviderToolRequest};

/// The opaque HTTP-bridge provider adapter: serialises a [`ProviderRequest`]
/// into a JSON envelope and POSTs it to `<base_url>/v1/generate`.
///
/// This is the only concrete `ProviderAdapter` this crate ships — the wire
/// format of whatever sits behind the bridge is out of scope, by design.
pub struct HttpBridgeProvider {
    name: String,
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpBridgeProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builder should not fail with these options");
        Self {
            name: name.into(),
            base_url: base_url.into(),
            token,
            client,
        }
    }
}

#[async_trait]
impl ProviderAdapter for HttpBridgeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/v1/generate", self.base_url.trim_end_matches('/'));
        let envelope = json!({
            "session_id": request.session_id,
            "user_id": request.user_id,
            "provider": request.provider,
            "model": request.model,
            "text": request.text,
            "attachments": request.attachments,
            "mcp_enabled": request.mcp_enabled,
            "mcp_profile_name": request.mcp_profile_name,
            "summaries": request.summaries,
            "tool_specs": request.tool_specs,
            "tool_results": request.tool_results,
            "tool_call_round": request.tool_call_round,
        });

        let mut builder = self.client.post(&url).json(&envelope);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(map_reqwest_err)?;

        if response.status().is_server_error() {
            return Err(ProviderError::UpstreamTransient(format!(
                "bridge returned {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(ProviderError::UpstreamTransient(format!(
                "bridge returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::UpstreamTransient(format!("malformed body: {e}")))?;
        parse_response(body)
    }
}

fn map_reqwest_err(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::UpstreamTransient(format!("timeout: {err}"))
    } else {
        ProviderError::UpstreamTransient(format!("network error: {err}"))
    }
}

/// Tool requests may come back under either `tool_requests` or `tool_calls`.
fn parse_response(body: Value) -> Result<ProviderResponse, ProviderError> {
    let Some(obj) = body.as_object() else {
        return Err(ProviderError::UpstreamTransient(
            "bridge response was not a JSON object".into(),
        ));
    };

    let output_text = obj
        .get("output_text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let decision_summary = obj
        .get("decision_summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let raw_requests = obj
        .get("tool_requests")
        .or_else(|| obj.get("tool_calls"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut tool_requests = Vec::with_capacity(raw_requests.len());
    for raw in raw_requests {
        let Some(name) = raw.get("name").and_then(Value::as_str) else {
            return Err(ProviderError::UpstreamTransient(
                "tool request missing non-empty name".into(),
            ));
        };
        if name.is_empty() {
            return Err(ProviderError::UpstreamTransient(
                "tool request missing non-empty name".into(),
            ));
        }
        let call_id = raw
            .get("call_id")
            .or_else(|| raw.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let arguments = raw.get("arguments").cloned().unwrap_or(Value::Null);
        tool_requests.push(ProviderToolRequest {
            name: name.to_string(),
            call_id,
            arguments,
        });
    }

    Ok(ProviderResponse {
        output_text,
        decision_summary,
        tool_requests,
    })
}
