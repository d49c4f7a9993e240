// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

/// Settings for [`CopilotAuthBootstrapper::ensure_token`]. Mirrors the fields
/// of `ProviderBridgeConfig` that bear on credential resolution plus the
/// workspace root the cache path is resolved against.
#[derive(Debug, Clone)]
pub struct CopilotAuthSettings {
    pub bridge_base_url: String,
    pub bridge_token: Option<String>,
    pub timeout: Duration,
    pub cache_path: PathBuf,
    pub workspace_root: PathBuf,
    pub auto_login_enabled: bool,
    pub login_endpoint: String,
}

#[derive(Serialize, Deserialize)]
struct CachedToken {
    token: String,
}

/// Resolves the bearer token a provider adapter talks to the bridge with,
/// in priority order: configured token, on-disk cache, auto-login.
///
/// A token obtained from configuration or auto-login is written back to the
/// cache so the next process start can skip the round trip.
pub struct CopilotAuthBootstrapper {
    settings: CopilotAuthSettings,
    client: reqwest::Client,
}

impl CopilotAuthBootstrapper {
    pub fn new(settings: CopilotAuthSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .expect("reqwest client builder should not fail with these options");
        Self { settings, client }
    }

    pub async fn ensure_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = &self.settings.bridge_token {
            self.write_cached_token(token);
            return Ok(token.clone());
        }

        if let Some(token) = self.read_cached_token() {
            return Ok(token);
        }

        if !self.settings.auto_login_enabled {
            return Err(ProviderError::Configuration(
                "no bridge token configured and auto-login is disabled".into(),
            ));
        }

        let token = self.request_login_token().await?;
        self.write_cached_token(&token);
        Ok(token)
    }

    fn cache_file_path(&self) -> PathBuf {
        let candidate = &self.settings.cache_path;
        if candidate.is_absolute() {
            candidate.clone()
        } else {
            self.settings.workspace_root.join(candidate)
        }
    }

    fn read_cached_token(&self) -> Option<String> {
        let path = self.cache_file_path();
        let contents = std::fs::read_to_string(&path).ok()?;
        let cached: CachedToken = serde_json::from_str(&contents).ok()?;
        if cached.token.is_empty() {
            None
        } else {
            Some(cached.token)
        }
    }

    fn write_cached_token(&self, token: &str) {
        let path = self.cache_file_path();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, path = %parent.display(), "failed to create copilot-auth cache directory");
                return;
            }
        }
        let payload = CachedToken { token: token.to_string() };
        match serde_json::to_string(&payload) {
            Ok(body) => {
                if let Err(e) = std::fs::write(&path, body) {
                    tracing::warn!(error = %e, path = %path.display(), "failed to write copilot-auth cache");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize copilot-auth cache payload"),
        }
    }

    async fn request_login_token(&self) -> Result<String, ProviderError> {
        let base_url = self.settings.bridge_base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ProviderError::Configuration(
                "bridge base url is not configured; cannot auto-login".into(),
            ));
        }
        let path = &self.settings.login_endpoint;
        let login_path = if path.starts_with('/') {
            path.clone()
        } else {
            format!("/{path}")
        };
        let url = format!("{base_url}{login_path}");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::UpstreamTransient(format!("auto-login timed out: {e}"))
                } else {
                    ProviderError::UpstreamTransient(format!("auto-login network error: {e}"))
                }
            })?;

        if response.status().is_server_error() {
            return Err(ProviderError::UpstreamTransient(format!(
                "auto-login server error: {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(ProviderError::Configuration(format!(
                "auto-login request rejected: status={}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Configuration(format!("auto-login response was not JSON: {e}")))?;
        extract_token(&body)
            .ok_or_else(|| ProviderError::Configuration("auto-login response did not contain a token".into()))
    }
}

fn extract_token(body: &Value) -> Option<String> {
    let obj = body.as_object()?;
    for key in ["token", "access_token", "bearer_token", "api_key"] {
        if let Some(value) = obj.get(key).and_then(Value::as_str) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    obj.get("data").and_then(extract_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(workspace_root: &Path) -> CopilotAuthSettings {
        CopilotAuthSettings {
            bridge_base_url: String::new(),
            bridge_token: None,
            timeout: Duration::from_secs(5),
            cache_path: PathBuf::from(".cache/copilot-auth.json"),
            workspace_root: workspace_root.to_path_buf(),
            auto_login_enabled: false,
            login_endpoint: "/login".into(),
        }
    }

    #[tokio::test]
    async fn configured_token_is_used_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.bridge_token = Some("env-token".into());
        let bootstrapper = CopilotAuthBootstrapper::new(s);

        let token = bootstrapper.ensure_token().await.unwrap();
        assert_eq!(token, "env-token");
        assert!(dir.path().join(".cache/copilot-auth.json").exists());
    }

    #[tokio::test]
    async fn cached_token_is_read_when_none_configured() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join(".cache");
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join("copilot-auth.json"), r#"{"token":"cached-token"}"#).unwrap();

        let bootstrapper = CopilotAuthBootstrapper::new(settings(dir.path()));
        let token = bootstrapper.ensure_token().await.unwrap();
        assert_eq!(token, "cached-token");
    }

    #[tokio::test]
    async fn no_token_no_cache_no_auto_login_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrapper = CopilotAuthBootstrapper::new(settings(dir.path()));
        let err = bootstrapper.ensure_token().await.unwrap_err();
        assert!(!err.retryable());
    }
}
