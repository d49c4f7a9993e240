// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Errors a [`crate::ProviderAdapter`] can raise. Mirrors the subset of the
/// core's closed DomainError taxonomy that the provider boundary can produce;
/// `turnforge-core` maps these onto its own DomainError rather than this
/// crate depending upward on core.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider bridge not configured: {0}")]
    Configuration(String),

    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),
}

impl ProviderError {
    pub fn retryable(&self) -> bool {
        matches!(self, ProviderError::UpstreamTransient(_))
    }
}
