// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

/// Result of the once-per-client `initialize` handshake, cached for the
/// client's lifetime.
#[derive(Debug, Clone, Default)]
pub struct McpInitializeResult {
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub protocol_version: Option<String>,
    pub server_capabilities: Value,
    pub instructions: Option<String>,
    pub session_id: Option<String>,
}

pub(crate) mod rpc {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    #[derive(Debug, Serialize)]
    pub struct Request<'a> {
        pub jsonrpc: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub id: Option<u64>,
        pub method: &'a str,
        pub params: Value,
    }

    #[derive(Debug, Deserialize)]
    pub struct Response {
        #[serde(default)]
        pub result: Option<Value>,
        #[serde(default)]
        pub error: Option<Error>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Error {
        #[allow(dead_code)]
        pub code: i64,
        pub message: String,
    }
}
