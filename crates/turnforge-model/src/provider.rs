// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::{error::ProviderError, ProviderRequest, ProviderResponse};

/// A provider is opaque to the core: a name and a single non-streaming
/// `generate` call. No modality probing, no catalog, no context-window
/// bookkeeping — those belong to the out-of-scope remote provider wire
/// formats this crate deliberately does not implement.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier this adapter answers to (matched against `task.provider`).
    fn name(&self) -> &str;

    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}
