// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::ProviderAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// A provider adapter that replays a fixed sequence of scripted responses,
/// one per `generate` call, for use in TurnEngine tests. Panics if asked for
/// more responses than were scripted.
pub struct ScriptedMockProvider {
    name: String,
    responses: Mutex<Vec<ProviderResponse>>,
    calls: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedMockProvider {
    pub fn new(name: impl Into<String>, responses: Vec<ProviderResponse>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(responses.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests observed so far, in call order.
    pub fn calls(&self) -> Vec<ProviderRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedMockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::UpstreamTransient("mock exhausted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_responses_in_order() {
        let mock = ScriptedMockProvider::new(
            "mock",
            vec![
                ProviderResponse {
                    output_text: "first".into(),
                    decision_summary: "ok".into(),
                    tool_requests: vec![],
                },
                ProviderResponse {
                    output_text: "second".into(),
                    decision_summary: "ok".into(),
                    tool_requests: vec![],
                },
            ],
        );
        let req = |round: u32| ProviderRequest {
            session_id: "s".into(),
            user_id: "u".into(),
            provider: "mock".into(),
            model: "m".into(),
            text: "hi".into(),
            attachments: vec![],
            mcp_enabled: false,
            mcp_profile_name: None,
            summaries: String::new(),
            tool_specs: vec![],
            tool_results: vec![],
            tool_call_round: round,
        };
        let r1 = mock.generate(req(0)).await.unwrap();
        assert_eq!(r1.output_text, "first");
        let r2 = mock.generate(req(1)).await.unwrap();
        assert_eq!(r2.output_text, "second");
        assert_eq!(mock.calls().len(), 2);
    }
}
