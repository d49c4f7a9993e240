// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod copilot_auth;
mod error;
mod http_bridge;
mod mock;
mod provider;
mod types;

pub use copilot_auth::{CopilotAuthBootstrapper, CopilotAuthSettings};
pub use error::ProviderError;
pub use http_bridge::HttpBridgeProvider;
pub use mock::ScriptedMockProvider;
pub use provider::ProviderAdapter;
pub use types::{
    AttachmentRef, ProviderRequest, ProviderResponse, ProviderToolRequest, ProviderToolResult,
    ToolSpec,
};
