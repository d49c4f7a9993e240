// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use turnforge_config::Config;
use turnforge_core::{SessionDefaults, SessionStore, TurnEngine, TurnEngineConfig, TurnTask};
use turnforge_mcp_client::{JsonRpcMcpClient, McpClient};
use turnforge_model::{CopilotAuthBootstrapper, CopilotAuthSettings, HttpBridgeProvider, ProviderAdapter};
use turnforge_runtime::AttachmentIngestor;
use turnforge_scheduler::{TurnWorkerPool, TurnWorkerPoolConfig};
use turnforge_sink::{EventKind, EventSink, HttpEventSink, SinkError, StreamEvent};
use turnforge_tools::{
    DeleteFileTool, EditFileTool, FsTool, GlobTool, GrepTool, ListDirTool, ReadFileTool, ShellTool,
    ToolRegistry, WebFetchTool, WriteTool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = turnforge_config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Commands::Serve => run_serve(config).await,
        Commands::Submit {
            text,
            provider,
            model,
            mcp,
            subagent,
        } => run_submit(config, text.clone(), provider.clone(), model.clone(), *mcp, subagent.clone()).await,
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn builtin_tool_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool);
    registry.register(EditFileTool);
    registry.register(WriteTool);
    registry.register(DeleteFileTool);
    registry.register(ListDirTool);
    registry.register(GlobTool);
    registry.register(GrepTool);
    registry.register(FsTool);
    registry.register(ShellTool::default());
    registry.register(WebFetchTool::default());
    registry
}

async fn build_providers(config: &Config) -> anyhow::Result<HashMap<String, Arc<dyn ProviderAdapter>>> {
    let bridge = &config.provider_bridge;
    let base_url = bridge
        .base_url
        .as_deref()
        .context("provider_bridge.base_url must be configured to build any provider adapter")?;
    let timeout = Duration::from_secs(bridge.timeout_seconds.unwrap_or(config.request_timeout_seconds));

    let mut names = config.providers.enabled_provider_names.clone();
    if names.is_empty() {
        if let Some(default) = &config.providers.default_provider_name {
            names.push(default.clone());
        }
    }
    if names.is_empty() {
        anyhow::bail!(
            "no enabled providers configured: set providers.enabled_provider_names or providers.default_provider_name"
        );
    }

    let bootstrapper = CopilotAuthBootstrapper::new(CopilotAuthSettings {
        bridge_base_url: base_url.to_string(),
        bridge_token: bridge.token.clone(),
        timeout,
        cache_path: bridge.auth_cache_path.clone(),
        workspace_root: config.workspace_root.clone(),
        auto_login_enabled: bridge.auto_login_enabled,
        login_endpoint: bridge.login_endpoint.clone(),
    });
    let token = bootstrapper
        .ensure_token()
        .await
        .context("failed to resolve a provider bridge bearer token")?;

    let mut providers: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
    for name in names {
        let adapter = HttpBridgeProvider::new(name.clone(), base_url, Some(token.clone()), timeout);
        providers.insert(name, Arc::new(adapter));
    }
    Ok(providers)
}

fn build_mcp_client(config: &Config) -> Option<Arc<dyn McpClient>> {
    config.mcp.as_ref().map(|mcp| {
        let client: Arc<dyn McpClient> = Arc::new(JsonRpcMcpClient::new(
            Some(mcp.server_url.clone()),
            mcp.server_token.clone(),
            Duration::from_secs(mcp.request_timeout_seconds),
        ));
        client
    })
}

fn build_event_sink(config: &Config) -> anyhow::Result<Arc<dyn EventSink>> {
    let base_url = config
        .gateway
        .base_url
        .clone()
        .context("gateway.base_url must be configured to publish turn events")?;
    let token = config
        .gateway
        .internal_token
        .clone()
        .context("gateway.internal_token must be configured to publish turn events")?;
    Ok(Arc::new(HttpEventSink::new(
        base_url,
        token,
        Duration::from_secs(config.request_timeout_seconds),
        Duration::from_secs_f64(config.limits.backoff_base_seconds),
        config.limits.retry_cap,
    )))
}

/// Global subagent path, then project-local — later paths win on a name
/// collision, so project overrides global (§4.3).
fn subagent_base_paths(workspace_root: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/turnforge/agents"));
    }
    paths.push(workspace_root.join(".turnforge/agents"));
    paths
}

async fn build_engine(config: &Config, event_sink: Arc<dyn EventSink>) -> anyhow::Result<TurnEngine> {
    let providers = build_providers(config).await?;
    let mcp_client = build_mcp_client(config);
    let attachment_ingestor = AttachmentIngestor::new(
        config.attachments.clone(),
        Duration::from_secs(config.request_timeout_seconds),
    );
    Ok(TurnEngine::new(TurnEngineConfig {
        subagent_base_paths: subagent_base_paths(&config.workspace_root),
        workspace_root: config.workspace_root.clone(),
        tool_registry: Arc::new(builtin_tool_registry()),
        providers,
        mcp_client,
        event_sink,
        attachment_ingestor,
        max_tool_rounds: config.agent.max_tool_rounds,
    }))
}

/// `serve`: boot every component, start the worker pool, and block until
/// Ctrl-C triggers a graceful drain (§4.11). There is no ingress here — a
/// gateway process (out of scope) would be the one calling `enqueue`.
async fn run_serve(config: Config) -> anyhow::Result<()> {
    let event_sink = build_event_sink(&config)?;
    let engine = Arc::new(build_engine(&config, event_sink.clone()).await?);

    let pool = TurnWorkerPool::start(
        TurnWorkerPoolConfig {
            worker_count: config.turn_worker_count,
            queue_depth: config.limits.queue_depth,
            graceful_drain: Duration::from_secs(config.limits.graceful_drain_seconds),
        },
        engine,
        event_sink,
    );

    tracing::info!(
        worker_count = config.turn_worker_count,
        queue_depth = config.limits.queue_depth,
        "turn worker pool started"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    tracing::info!("shutdown signal received, draining worker pool");
    pool.stop(Duration::from_secs(config.limits.graceful_drain_seconds)).await;
    Ok(())
}

/// Prints each [`StreamEvent`] for a turn to stdout as it is emitted, one
/// JSON object per line.
struct StdoutEventSink;

#[async_trait::async_trait]
impl EventSink for StdoutEventSink {
    async fn publish(&self, event: StreamEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));
        println!("{line}");
        if event.kind == EventKind::Error {
            tracing::warn!(text = %event.text, "turn ended in error");
        }
        Ok(())
    }
}

/// `submit`: drive one turn straight through the engine (bypassing the
/// queue and worker pool) and print its event stream. Useful for exercising
/// the full policy/subagent/tool/provider wiring without a gateway.
async fn run_submit(
    config: Config,
    text: String,
    provider: Option<String>,
    model: String,
    mcp: bool,
    subagent_name: Option<String>,
) -> anyhow::Result<()> {
    let sink: Arc<dyn EventSink> = Arc::new(StdoutEventSink);
    let engine = build_engine(&config, sink).await?;

    let provider = provider
        .or_else(|| config.providers.default_provider_name.clone())
        .context("no provider specified and no providers.default_provider_name configured")?;

    let store = SessionStore::new();
    let session = store.create(
        "local",
        "local-user",
        &uuid::Uuid::new_v4().to_string(),
        SessionDefaults {
            provider: provider.clone(),
            model: model.clone(),
            mcp_enabled: mcp,
            mcp_profile_name: None,
        },
    );

    let task = TurnTask {
        turn_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
        session_id: session.session_id,
        user_id: "local-user".to_string(),
        text,
        attachments: vec![],
        provider,
        model,
        mcp_enabled: mcp,
        mcp_profile_name: None,
        subagent_name,
    };

    engine.process(task).await?;
    Ok(())
}
