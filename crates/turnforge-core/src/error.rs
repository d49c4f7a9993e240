// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The closed DomainError taxonomy (§7). Every error the turn engine can
//! raise is one of these seven kinds; nothing else crosses the worker
//! boundary as a known error.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),
    #[error("rate limited: {0}")]
    RateLimit(String),
    #[error("timeout: {0}")]
    Timeout(String),
}

impl DomainError {
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            DomainError::UpstreamTransient(_) | DomainError::RateLimit(_) | DomainError::Timeout(_)
        )
    }

    /// Stable code for logging/metrics, independent of the display message.
    pub fn error_code(&self) -> &'static str {
        match self {
            DomainError::Authentication(_) => "authentication_error",
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Configuration(_) => "configuration_error",
            DomainError::UpstreamTransient(_) => "upstream_transient",
            DomainError::RateLimit(_) => "rate_limit",
            DomainError::Timeout(_) => "timeout",
        }
    }
}

impl From<turnforge_runtime::RuntimeError> for DomainError {
    fn from(e: turnforge_runtime::RuntimeError) -> Self {
        match e {
            turnforge_runtime::RuntimeError::Validation(m) => DomainError::Validation(m),
            turnforge_runtime::RuntimeError::Configuration(m) => DomainError::Configuration(m),
            turnforge_runtime::RuntimeError::UpstreamTransient(m) => DomainError::UpstreamTransient(m),
        }
    }
}

impl From<turnforge_mcp_client::McpError> for DomainError {
    fn from(e: turnforge_mcp_client::McpError) -> Self {
        match e {
            turnforge_mcp_client::McpError::Configuration(m) => DomainError::Configuration(m),
            turnforge_mcp_client::McpError::UpstreamTransient(m) => DomainError::UpstreamTransient(m),
        }
    }
}

impl From<turnforge_sink::SinkError> for DomainError {
    fn from(e: turnforge_sink::SinkError) -> Self {
        match e {
            turnforge_sink::SinkError::Transient(m) => DomainError::UpstreamTransient(m),
            turnforge_sink::SinkError::Rejected(m) => DomainError::Validation(m),
        }
    }
}

impl From<turnforge_model::ProviderError> for DomainError {
    fn from(e: turnforge_model::ProviderError) -> Self {
        match e {
            turnforge_model::ProviderError::Configuration(m) => DomainError::Configuration(m),
            turnforge_model::ProviderError::UpstreamTransient(m) => DomainError::UpstreamTransient(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_ratelimit_timeout_are_retryable() {
        assert!(DomainError::UpstreamTransient("x".into()).retryable());
        assert!(DomainError::RateLimit("x".into()).retryable());
        assert!(DomainError::Timeout("x".into()).retryable());
        assert!(!DomainError::Validation("x".into()).retryable());
        assert!(!DomainError::NotFound("x".into()).retryable());
        assert!(!DomainError::Authentication("x".into()).retryable());
        assert!(!DomainError::Configuration("x".into()).retryable());
    }
}
