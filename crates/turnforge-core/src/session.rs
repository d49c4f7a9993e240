// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! In-memory SessionStore (§4.1): idempotent creation, copy-on-write
//! mutation, a single store-wide mutex. Ended sessions stay in the map —
//! history is kept for late-arriving events.
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub guild_id: String,
    pub requester_id: String,
    pub channel_id: Option<String>,
    pub status: SessionStatus,
    pub provider: String,
    pub model: String,
    pub mcp_enabled: bool,
    pub mcp_profile_name: Option<String>,
    pub subagent_name: Option<String>,
}

/// The provider/model/mcp defaults a fresh session is created with.
#[derive(Debug, Clone, Default)]
pub struct SessionDefaults {
    pub provider: String,
    pub model: String,
    pub mcp_enabled: bool,
    pub mcp_profile_name: Option<String>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionRecord>,
    idempotency_index: HashMap<String, String>,
}

#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing record unchanged if `idempotency_key` was seen
    /// before; otherwise mints a fresh session and returns it.
    pub fn create(
        &self,
        guild_id: &str,
        requester_id: &str,
        idempotency_key: &str,
        defaults: SessionDefaults,
    ) -> SessionRecord {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing_id) = inner.idempotency_index.get(idempotency_key).cloned() {
            return inner
                .sessions
                .get(&existing_id)
                .cloned()
                .expect("idempotency index entries always point at a live session");
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let record = SessionRecord {
            session_id: session_id.clone(),
            guild_id: guild_id.to_string(),
            requester_id: requester_id.to_string(),
            channel_id: None,
            status: SessionStatus::Active,
            provider: defaults.provider,
            model: defaults.model,
            mcp_enabled: defaults.mcp_enabled,
            mcp_profile_name: defaults.mcp_profile_name,
            subagent_name: None,
        };
        inner.sessions.insert(session_id.clone(), record.clone());
        inner
            .idempotency_index
            .insert(idempotency_key.to_string(), session_id);
        record
    }

    pub fn get(&self, session_id: &str) -> Result<SessionRecord, DomainError> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("unknown session {session_id}")))
    }

    pub fn bind_channel(&self, session_id: &str, channel_id: &str) -> Result<SessionRecord, DomainError> {
        self.mutate(session_id, |r| r.channel_id = Some(channel_id.to_string()))
    }

    pub fn end_session(&self, session_id: &str) -> Result<SessionRecord, DomainError> {
        self.mutate(session_id, |r| r.status = SessionStatus::Ended)
    }

    pub fn set_provider(&self, session_id: &str, provider: &str) -> Result<SessionRecord, DomainError> {
        self.mutate(session_id, |r| r.provider = provider.to_string())
    }

    pub fn set_model(&self, session_id: &str, model: &str) -> Result<SessionRecord, DomainError> {
        self.mutate(session_id, |r| r.model = model.to_string())
    }

    pub fn set_mcp(
        &self,
        session_id: &str,
        enabled: bool,
        profile: Option<String>,
    ) -> Result<SessionRecord, DomainError> {
        self.mutate(session_id, |r| {
            r.mcp_enabled = enabled;
            r.mcp_profile_name = profile.clone();
        })
    }

    pub fn set_subagent(&self, session_id: &str, name: Option<String>) -> Result<SessionRecord, DomainError> {
        self.mutate(session_id, |r| r.subagent_name = name.clone())
    }

    fn mutate(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionRecord),
    ) -> Result<SessionRecord, DomainError> {
        let mut inner = self.inner.lock().unwrap();
        let mut record = inner
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("unknown session {session_id}")))?;
        f(&mut record);
        inner.sessions.insert(session_id.to_string(), record.clone());
        Ok(record)
    }
}
