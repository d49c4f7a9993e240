// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Errors the MCP client can raise. `turnforge-core` maps these onto its own
/// closed DomainError taxonomy at the call site.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("mcp configuration error: {0}")]
    Configuration(String),

    #[error("mcp upstream transient error: {0}")]
    UpstreamTransient(String),
}

impl McpError {
    pub fn retryable(&self) -> bool {
        matches!(self, McpError::UpstreamTransient(_))
    }
}
