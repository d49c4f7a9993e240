// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Errors a [`crate::EventSink`] can raise. `turnforge-core` maps these onto
/// its own closed DomainError taxonomy at the call site.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Timeout, network error, or 5xx — already retried internally; this is
    /// what's left after the retry budget is exhausted.
    #[error("event sink upstream transient error: {0}")]
    Transient(String),

    /// A non-transient (e.g. 4xx) response from the gateway. Not retried.
    #[error("event sink rejected publish: {0}")]
    Rejected(String),
}
