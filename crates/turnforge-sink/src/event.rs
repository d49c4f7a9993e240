// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// The six lifecycle event kinds a turn can publish, in the order invariant
/// 4 (§3) constrains: `plan action* (decision_summary response_delta? action*)* (final|error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Plan,
    Action,
    DecisionSummary,
    ResponseDelta,
    Final,
    Error,
}

/// One event in a turn's stream, as published to the gateway sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub session_id: String,
    pub turn_id: String,
    pub trace_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub text: String,
}

impl StreamEvent {
    pub fn new(
        session_id: impl Into<String>,
        turn_id: impl Into<String>,
        trace_id: impl Into<String>,
        kind: EventKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            turn_id: turn_id.into(),
            trace_id: trace_id.into(),
            kind,
            text: text.into(),
        }
    }
}
