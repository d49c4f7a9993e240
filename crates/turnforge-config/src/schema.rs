// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_worker_count() -> usize {
    4
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_queue_depth() -> usize {
    1000
}

fn default_backoff_base_seconds() -> f64 {
    0.3
}

fn default_retry_cap() -> u32 {
    4
}

fn default_graceful_drain_seconds() -> u64 {
    30
}

fn default_max_attachment_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

/// Top-level configuration for the turn-processing engine.
///
/// Loaded by [`crate::load`] from a layered set of YAML files; every field
/// has a conservative default so a bare `Config::default()` is a usable
/// (if inert) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bearer token turn ingress expects from the gateway. Left unset on
    /// purpose: there is no safe development default for an auth token, so
    /// components that need one must fail fast at startup rather than run
    /// unauthenticated.
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub provider_bridge: ProviderBridgeConfig,

    /// MCP server connection. Absent entirely disables MCP for every turn
    /// that doesn't request it via a subagent override.
    #[serde(default)]
    pub mcp: Option<McpConfig>,

    #[serde(default)]
    pub attachments: AttachmentsConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    /// Root directory PolicyLoader reads rule/agent/skill artifacts from.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    #[serde(default = "default_worker_count")]
    pub turn_worker_count: usize,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            gateway: GatewayConfig::default(),
            providers: ProvidersConfig::default(),
            provider_bridge: ProviderBridgeConfig::default(),
            mcp: None,
            attachments: AttachmentsConfig::default(),
            agent: AgentConfig::default(),
            limits: LimitsConfig::default(),
            workspace_root: default_workspace_root(),
            turn_worker_count: default_worker_count(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

/// Event egress target: `<base_url>/internal/stream-events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub internal_token: Option<String>,
}

/// Which provider names are usable and which is picked when a turn doesn't
/// name one explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub default_provider_name: Option<String>,
    #[serde(default)]
    pub enabled_provider_names: Vec<String>,
}

/// Connection settings for the opaque HTTP provider bridge (`POST
/// <base_url>/v1/generate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBridgeConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,

    /// Path to the bootstrap credential cache, relative to `workspace_root`
    /// unless absolute. Read when `token` is unset; written once a token is
    /// obtained from the environment or from auto-login.
    #[serde(default = "default_copilot_auth_cache_path")]
    pub auth_cache_path: PathBuf,

    /// Whether to request a fresh token from the bridge's login endpoint
    /// when no token is configured and the cache is empty or missing.
    #[serde(default)]
    pub auto_login_enabled: bool,

    /// Bridge-relative path the auto-login POST is sent to.
    #[serde(default = "default_login_endpoint")]
    pub login_endpoint: String,
}

fn default_copilot_auth_cache_path() -> PathBuf {
    PathBuf::from(".cache/copilot-auth.json")
}

fn default_login_endpoint() -> String {
    "/login".to_string()
}

impl Default for ProviderBridgeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_seconds: None,
            auth_cache_path: default_copilot_auth_cache_path(),
            auto_login_enabled: false,
            login_endpoint: default_login_endpoint(),
        }
    }
}

/// Connection settings for the MCP server this process talks to as a
/// client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    pub server_url: String,
    pub server_token: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

/// Attachment download policy used by AttachmentIngestor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentsConfig {
    #[serde(default)]
    pub download_enabled: bool,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./attachments")
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            download_enabled: false,
            max_bytes: default_max_attachment_bytes(),
            storage_dir: default_storage_dir(),
        }
    }
}

/// Behaviour knobs for the provider↔tool loop inside TurnEngine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on provider-loop rounds. `None` means unbounded, matching
    /// the default read directly off of the loop's own "unbounded rounds"
    /// framing; operators who want a safety cap can set one explicitly.
    #[serde(default)]
    pub max_tool_rounds: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: None,
        }
    }
}

/// The constants named in the external-interfaces section, exposed as
/// overridable fields with the documented defaults rather than hidden
/// literals scattered through the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_backoff_base_seconds")]
    pub backoff_base_seconds: f64,
    #[serde(default = "default_retry_cap")]
    pub retry_cap: u32,
    #[serde(default = "default_graceful_drain_seconds")]
    pub graceful_drain_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            backoff_base_seconds: default_backoff_base_seconds(),
            retry_cap: default_retry_cap(),
            graceful_drain_seconds: default_graceful_drain_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_unbounded_tool_rounds() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.max_tool_rounds, None);
    }

    #[test]
    fn default_config_has_no_auth_tokens() {
        let cfg = Config::default();
        assert!(cfg.api_token.is_none());
        assert!(cfg.gateway.internal_token.is_none());
        assert!(cfg.provider_bridge.token.is_none());
    }

    #[test]
    fn default_limits_match_spec_constants() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.queue_depth, 1000);
        assert_eq!(limits.retry_cap, 4);
        assert_eq!(limits.graceful_drain_seconds, 30);
        assert!((limits.backoff_base_seconds - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn deserializes_minimal_yaml() {
        let yaml = "gateway:\n  base_url: http://gw.internal\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.gateway.base_url.as_deref(), Some("http://gw.internal"));
        assert_eq!(cfg.turn_worker_count, 4);
    }
}
