// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! TurnEngine (§4.9): the per-turn orchestration state machine. One call to
//! `process` walks policy load, subagent overlay, attachment ingest, tool
//! catalog assembly, policy enforcement, and the provider↔tool round loop,
//! publishing a well-ordered event stream as it goes.
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use turnforge_mcp_client::McpClient;
use turnforge_model::{ProviderAdapter, ProviderRequest, ProviderToolRequest, ProviderToolResult, ToolSpec};
use turnforge_runtime::{
    enforce, extract_agent_defaults, first_nonempty_line, parse_policy_constraints, load_project_context_file,
    AttachmentIngestor, PolicyLoader, SubagentSpec,
};
use turnforge_sink::{EventKind, EventSink, StreamEvent};
use turnforge_tools::{ToolCall, ToolRegistry};

use crate::error::DomainError;
use crate::turn::TurnTask;

/// Name/version identifying this client to an MCP server's `initialize`.
const MCP_CLIENT_NAME: &str = "turnforge";
const MCP_CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct TurnEngineConfig {
    pub workspace_root: PathBuf,
    pub subagent_base_paths: Vec<PathBuf>,
    pub tool_registry: Arc<ToolRegistry>,
    pub providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    pub mcp_client: Option<Arc<dyn McpClient>>,
    pub event_sink: Arc<dyn EventSink>,
    pub attachment_ingestor: AttachmentIngestor,
    /// `None` = unbounded rounds; `Some(n)` forces a FINAL after round n.
    pub max_tool_rounds: Option<u32>,
}

pub struct TurnEngine {
    workspace_root: PathBuf,
    subagent_base_paths: Vec<PathBuf>,
    tool_registry: Arc<ToolRegistry>,
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    mcp_client: Option<Arc<dyn McpClient>>,
    event_sink: Arc<dyn EventSink>,
    attachment_ingestor: AttachmentIngestor,
    max_tool_rounds: Option<u32>,
}

impl TurnEngine {
    pub fn new(config: TurnEngineConfig) -> Self {
        Self {
            workspace_root: config.workspace_root,
            subagent_base_paths: config.subagent_base_paths,
            tool_registry: config.tool_registry,
            providers: config.providers,
            mcp_client: config.mcp_client,
            event_sink: config.event_sink,
            attachment_ingestor: config.attachment_ingestor,
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    async fn emit(&self, task: &TurnTask, kind: EventKind, text: impl Into<String>) -> Result<(), DomainError> {
        let event = StreamEvent::new(&task.session_id, &task.turn_id, &task.trace_id, kind, text);
        self.event_sink.publish(event).await?;
        Ok(())
    }

    pub async fn process(&self, task: TurnTask) -> Result<(), DomainError> {
        // 1. Load snapshot.
        let rules_path = self.workspace_root.join("CODIAL.md");
        let agents_path = self.workspace_root.join("AGENTS.md");
        let skills_dir = self.workspace_root.join("skills");
        let snapshot = PolicyLoader::load(&rules_path, &agents_path, &skills_dir);
        let constraints = parse_policy_constraints(&snapshot.rules_text);
        let _agent_defaults = extract_agent_defaults(&snapshot.agents_text);

        // 2. Emit PLAN.
        self.emit(
            &task,
            EventKind::Plan,
            format!(
                "요청을 분석… provider={} model={} subagent={} attachments={}",
                task.provider,
                task.model,
                task.subagent_name.as_deref().unwrap_or("-"),
                task.attachments.len()
            ),
        )
        .await?;

        // 3. Emit ACTION (policy summaries).
        let claude_summary = load_project_context_file(&self.workspace_root)
            .map(|c| first_nonempty_line(&c))
            .unwrap_or_else(|| "파일이 없어요.".to_string());
        self.emit(
            &task,
            EventKind::Action,
            format!(
                "CLAUDE={} RULES={} AGENTS={} SKILLS={}",
                claude_summary, snapshot.rules_summary, snapshot.agents_summary, snapshot.skills_summary
            ),
        )
        .await?;

        // 4. Subagent overlay.
        let mut effective_text = task.text.clone();
        let mut effective_model = task.model.clone();
        let mut effective_mcp_enabled = task.mcp_enabled;
        let mut mcp_profile_name = task.mcp_profile_name.clone();
        let mut memory_summary = snapshot.system_memory_summary.clone();

        if let Some(subagent_name) = &task.subagent_name {
            let subagents = turnforge_runtime::discover_subagents(&self.subagent_base_paths)?;
            match subagents.get(subagent_name) {
                None => {
                    self.emit(
                        &task,
                        EventKind::Action,
                        format!("서브에이전트 '{subagent_name}'를 찾을 수 없어 기본값으로 진행합니다"),
                    )
                    .await?;
                }
                Some(spec) => {
                    apply_subagent_overlay(
                        spec,
                        &task,
                        &mut effective_text,
                        &mut effective_model,
                        &mut effective_mcp_enabled,
                        &mut mcp_profile_name,
                        &mut memory_summary,
                    );
                    self.emit(
                        &task,
                        EventKind::Action,
                        format!(
                            "서브에이전트 '{}' 적용: model={} mcp={}",
                            spec.name, effective_model, effective_mcp_enabled
                        ),
                    )
                    .await?;
                }
            }
        }

        // 5. Ingest attachments.
        let attachment_result = self
            .attachment_ingestor
            .ingest(&task.session_id, &task.turn_id, &task.attachments)
            .await?;
        self.emit(&task, EventKind::Action, attachment_result.summary.clone())
            .await?;

        // 6. Assemble tool catalog.
        let builtin_specs = self.tool_registry.to_provider_specs();
        let builtin_tool_names: HashSet<String> = builtin_specs.iter().map(|s| s.name.clone()).collect();
        self.emit(
            &task,
            EventKind::Action,
            format!("사용 가능한 내장 도구: {}", self.tool_registry.names().join(", ")),
        )
        .await?;

        let mut tool_specs: Vec<ToolSpec> = builtin_specs
            .into_iter()
            .map(|s| ToolSpec {
                name: s.name,
                title: s.title,
                description: s.description,
                input_schema: s.parameters,
            })
            .collect();

        if effective_mcp_enabled {
            if let Some(mcp) = &self.mcp_client {
                let listing = async {
                    mcp.ensure_initialized(MCP_CLIENT_NAME, MCP_CLIENT_VERSION).await?;
                    mcp.list_tools().await
                }
                .await;
                match listing {
                    Ok(mcp_specs) => {
                        for spec in mcp_specs {
                            if !builtin_tool_names.contains(&spec.name) {
                                tool_specs.push(spec);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "mcp tool listing failed, continuing without mcp tools");
                        self.emit(&task, EventKind::Action, "내장 도구만 사용").await?;
                        effective_mcp_enabled = false;
                    }
                }
            }
        }

        // 7. Enforce policy.
        enforce(&task.provider, &effective_model, &constraints, &snapshot.available_skills)?;

        // 8. Resolve provider adapter.
        let adapter = self
            .providers
            .get(&task.provider)
            .ok_or_else(|| DomainError::Validation(format!("unknown provider: {}", task.provider)))?
            .clone();

        // 9. Provider↔tool loop.
        let mut round: u32 = 0;
        let mut tool_results: Vec<ProviderToolResult> = Vec::new();
        let summaries = format!(
            "CLAUDE={} RULES={} AGENTS={} SKILLS={} MEMORY={}",
            claude_summary, snapshot.rules_summary, snapshot.agents_summary, snapshot.skills_summary, memory_summary
        );

        loop {
            if let Some(max) = self.max_tool_rounds {
                if round > max {
                    self.emit(&task, EventKind::Final, "최대 도구 호출 횟수에 도달했어요.")
                        .await?;
                    return Ok(());
                }
            }

            let request = ProviderRequest {
                session_id: task.session_id.clone(),
                user_id: task.user_id.clone(),
                provider: task.provider.clone(),
                model: effective_model.clone(),
                text: effective_text.clone(),
                attachments: task.attachments.clone(),
                mcp_enabled: effective_mcp_enabled,
                mcp_profile_name: mcp_profile_name.clone(),
                summaries: summaries.clone(),
                tool_specs: tool_specs.clone(),
                tool_results: tool_results.clone(),
                tool_call_round: round,
            };

            let response = adapter.generate(request).await?;

            self.emit(&task, EventKind::DecisionSummary, response.decision_summary.clone())
                .await?;
            if !response.output_text.is_empty() {
                self.emit(&task, EventKind::ResponseDelta, response.output_text.clone())
                    .await?;
            }

            if response.tool_requests.is_empty() {
                self.emit(&task, EventKind::Final, "작업을 완료했어요.").await?;
                return Ok(());
            }

            tool_results = self
                .dispatch_tools(&task, &response.tool_requests, &builtin_tool_names, effective_mcp_enabled)
                .await?;
            round += 1;
        }
    }

    /// Tool dispatch (§4.10): one `ProviderToolResult` per request, never
    /// aborting the round on an individual tool's failure.
    async fn dispatch_tools(
        &self,
        task: &TurnTask,
        requests: &[ProviderToolRequest],
        builtin_tool_names: &HashSet<String>,
        mcp_enabled: bool,
    ) -> Result<Vec<ProviderToolResult>, DomainError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = if builtin_tool_names.contains(&request.name) {
                let call = ToolCall {
                    id: request.call_id.clone().unwrap_or_else(|| request.name.clone()),
                    name: request.name.clone(),
                    args: request.arguments.clone(),
                };
                let out = self.tool_registry.call(&call).await;
                self.emit(task, EventKind::Action, if out.is_error { "실패" } else { "성공" })
                    .await?;
                if out.is_error {
                    ProviderToolResult {
                        name: request.name.clone(),
                        call_id: request.call_id.clone(),
                        ok: false,
                        result: None,
                        error: Some(out.content),
                    }
                } else {
                    ProviderToolResult {
                        name: request.name.clone(),
                        call_id: request.call_id.clone(),
                        ok: true,
                        result: Some(json!({ "output": out.content, "metadata": out.metadata })),
                        error: None,
                    }
                }
            } else if mcp_enabled {
                if let Some(mcp) = &self.mcp_client {
                    match mcp.call_tool(&request.name, request.arguments.clone()).await {
                        Ok(value) => {
                            self.emit(task, EventKind::Action, "성공").await?;
                            ProviderToolResult {
                                name: request.name.clone(),
                                call_id: request.call_id.clone(),
                                ok: true,
                                result: Some(value),
                                error: None,
                            }
                        }
                        Err(e) => {
                            self.emit(task, EventKind::Action, "실패").await?;
                            ProviderToolResult {
                                name: request.name.clone(),
                                call_id: request.call_id.clone(),
                                ok: false,
                                result: None,
                                error: Some(e.to_string()),
                            }
                        }
                    }
                } else {
                    self.emit(task, EventKind::Action, "실패").await?;
                    unreachable_mcp_disabled_result(request)
                }
            } else {
                self.emit(task, EventKind::Action, "실패").await?;
                unreachable_mcp_disabled_result(request)
            };
            results.push(result);
        }
        Ok(results)
    }
}

fn unreachable_mcp_disabled_result(request: &ProviderToolRequest) -> ProviderToolResult {
    ProviderToolResult {
        name: request.name.clone(),
        call_id: request.call_id.clone(),
        ok: false,
        result: None,
        error: Some("cannot execute: not builtin and MCP disabled".to_string()),
    }
}

/// Applies §4.9 step 4's subagent overlay rules in place.
fn apply_subagent_overlay(
    spec: &SubagentSpec,
    task: &TurnTask,
    effective_text: &mut String,
    effective_model: &mut String,
    effective_mcp_enabled: &mut bool,
    mcp_profile_name: &mut Option<String>,
    memory_summary: &mut String,
) {
    if spec.model != "inherit" {
        *effective_model = spec.model.clone();
    }
    if !spec.prompt.trim().is_empty() {
        *effective_text = if task.text.is_empty() {
            spec.prompt.clone()
        } else {
            format!("{}\n\n사용자 요청:\n{}", spec.prompt, task.text)
        };
    }
    if !spec.mcp_servers.is_empty() {
        *effective_mcp_enabled = true;
        if mcp_profile_name.is_none() {
            *mcp_profile_name = spec.mcp_servers.first().cloned();
        }
    }
    if let Some(memory) = &spec.memory {
        *memory_summary = format!("{}, subagent-memory={}", memory_summary, memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnforge_config::AttachmentsConfig;
    use turnforge_model::{ProviderResponse, ScriptedMockProvider};
    use turnforge_sink::SinkError;

    struct RecordingSink {
        events: tokio::sync::Mutex<Vec<StreamEvent>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                events: tokio::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl EventSink for RecordingSink {
        async fn publish(&self, event: StreamEvent) -> Result<(), SinkError> {
            self.events.lock().await.push(event);
            Ok(())
        }
    }

    fn task() -> TurnTask {
        TurnTask {
            turn_id: "t1".into(),
            trace_id: "tr1".into(),
            session_id: "s1".into(),
            user_id: "u1".into(),
            text: "hello".into(),
            attachments: vec![],
            provider: "mock".into(),
            model: "m1".into(),
            mcp_enabled: false,
            mcp_profile_name: None,
            subagent_name: None,
        }
    }

    fn make_engine(
        sink: Arc<RecordingSink>,
        responses: Vec<ProviderResponse>,
        workspace_root: PathBuf,
    ) -> TurnEngine {
        let mut providers: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        providers.insert(
            "mock".to_string(),
            Arc::new(ScriptedMockProvider::new("mock", responses)),
        );
        let attachment_ingestor = AttachmentIngestor::new(
            AttachmentsConfig {
                download_enabled: false,
                max_bytes: 1024,
                storage_dir: workspace_root.join("attachments"),
            },
            std::time::Duration::from_secs(5),
        );
        TurnEngine::new(TurnEngineConfig {
            subagent_base_paths: vec![workspace_root.join("subagents")],
            workspace_root,
            tool_registry: Arc::new(ToolRegistry::new()),
            providers,
            mcp_client: None,
            event_sink: sink,
            attachment_ingestor,
            max_tool_rounds: None,
        })
    }

    #[tokio::test]
    async fn happy_path_emits_plan_action_decision_final_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let engine = make_engine(
            sink.clone(),
            vec![ProviderResponse {
                output_text: "done".into(),
                decision_summary: "no tools needed".into(),
                tool_requests: vec![],
            }],
            dir.path().to_path_buf(),
        );

        engine.process(task()).await.unwrap();

        let events = sink.events.lock().await;
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds[0], EventKind::Plan);
        assert!(kinds[1..kinds.len() - 1].iter().all(|k| {
            matches!(
                k,
                EventKind::Action | EventKind::DecisionSummary | EventKind::ResponseDelta
            )
        }));
        assert_eq!(*kinds.last().unwrap(), EventKind::Final);
    }

    #[tokio::test]
    async fn unknown_provider_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let engine = make_engine(sink, vec![], dir.path().to_path_buf());
        let mut t = task();
        t.provider = "does-not-exist".into();
        let err = engine.process(t).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn policy_denylist_blocks_the_turn() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CODIAL.md"), "deny_providers: mock\n").unwrap();
        let sink = Arc::new(RecordingSink::new());
        let engine = make_engine(
            sink,
            vec![ProviderResponse {
                output_text: "unreachable".into(),
                decision_summary: "x".into(),
                tool_requests: vec![],
            }],
            dir.path().to_path_buf(),
        );
        let err = engine.process(task()).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn tool_round_then_final() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        registry.register(turnforge_tools::ListDirTool);
        let sink = Arc::new(RecordingSink::new());

        let mut providers: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        providers.insert(
            "mock".to_string(),
            Arc::new(ScriptedMockProvider::new(
                "mock",
                vec![
                    ProviderResponse {
                        output_text: String::new(),
                        decision_summary: "listing files".into(),
                        tool_requests: vec![ProviderToolRequest {
                            name: "list_dir".into(),
                            call_id: Some("c1".into()),
                            arguments: json!({ "path": dir.path().to_str().unwrap() }),
                        }],
                    },
                    ProviderResponse {
                        output_text: "done".into(),
                        decision_summary: "wrapping up".into(),
                        tool_requests: vec![],
                    },
                ],
            )),
        );
        let attachment_ingestor = AttachmentIngestor::new(
            AttachmentsConfig {
                download_enabled: false,
                max_bytes: 1024,
                storage_dir: dir.path().join("attachments"),
            },
            std::time::Duration::from_secs(5),
        );
        let engine = TurnEngine::new(TurnEngineConfig {
            subagent_base_paths: vec![dir.path().join("subagents")],
            workspace_root: dir.path().to_path_buf(),
            tool_registry: Arc::new(registry),
            providers,
            mcp_client: None,
            event_sink: sink.clone(),
            attachment_ingestor,
            max_tool_rounds: None,
        });

        engine.process(task()).await.unwrap();
        let events = sink.events.lock().await;
        assert!(events.iter().any(|e| e.kind == EventKind::Final && e.text.contains("완료")));
    }
}
