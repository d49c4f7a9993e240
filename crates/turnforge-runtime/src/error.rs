// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Errors raised by policy loading, subagent/skill discovery and attachment
//! ingestion. Deliberately small and upstream-agnostic: `turnforge-core`
//! holds the closed `DomainError` taxonomy and maps these into it at the
//! point it calls into this crate.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),
}

impl RuntimeError {
    pub fn retryable(&self) -> bool {
        matches!(self, RuntimeError::UpstreamTransient(_))
    }
}
