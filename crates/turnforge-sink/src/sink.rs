// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP event sink with exponential-backoff-with-jitter retries (§4.8).
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::SinkError;
use crate::event::StreamEvent;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: StreamEvent) -> Result<(), SinkError>;
}

/// Publishes to `<base_url>/internal/stream-events` with an
/// `x-internal-token` header, retrying transient failures up to `retry_cap`
/// times with `base_seconds * 2^attempt` backoff plus ±20% jitter.
pub struct HttpEventSink {
    base_url: String,
    internal_token: String,
    client: reqwest::Client,
    backoff_base: Duration,
    retry_cap: u32,
}

impl HttpEventSink {
    pub fn new(
        base_url: impl Into<String>,
        internal_token: impl Into<String>,
        request_timeout: Duration,
        backoff_base: Duration,
        retry_cap: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            internal_token: internal_token.into(),
            client,
            backoff_base,
            retry_cap: retry_cap.max(1),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_base.as_secs_f64();
        let exp = base * 2f64.powi(attempt as i32);
        let jitter_span = base * 0.2;
        let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_secs_f64((exp + jitter).max(0.0))
    }

    async fn try_once(&self, event: &StreamEvent) -> Result<(), SinkError> {
        let url = format!("{}/internal/stream-events", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-internal-token", &self.internal_token)
            .json(event)
            .send()
            .await
            .map_err(|e| SinkError::Transient(format!("event publish failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_server_error() {
            return Err(SinkError::Transient(format!("event publish returned {status}")));
        }
        Err(SinkError::Rejected(format!("event publish returned {status}")))
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn publish(&self, event: StreamEvent) -> Result<(), SinkError> {
        let mut last_err: Option<SinkError> = None;
        for attempt in 0..self.retry_cap {
            match self.try_once(&event).await {
                Ok(()) => return Ok(()),
                Err(SinkError::Rejected(msg)) => return Err(SinkError::Rejected(msg)),
                Err(transient) => {
                    last_err = Some(transient);
                    if attempt + 1 < self.retry_cap {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }
        Err(SinkError::Transient(format!(
            "publish failed after {} attempts: {}",
            self.retry_cap,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}
