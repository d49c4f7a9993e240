// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use turnforge_core::{DomainError, TurnEngine, TurnTask};
use turnforge_sink::{EventKind, EventSink, StreamEvent};

/// Knobs for [`TurnWorkerPool::start`]. Mirrors the constants named in the
/// external-interfaces section: queue depth 1000, graceful drain 30s.
#[derive(Debug, Clone)]
pub struct TurnWorkerPoolConfig {
    pub worker_count: usize,
    pub queue_depth: usize,
    pub graceful_drain: Duration,
}

impl Default for TurnWorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_depth: 1000,
            graceful_drain: Duration::from_secs(30),
        }
    }
}

/// Bounded FIFO queue plus `worker_count` supervisor fibres (§4.11).
/// `enqueue` suspends the caller once the queue is at `queue_depth` (§3
/// invariant 7); `stop` drains in-flight work before cancelling workers.
pub struct TurnWorkerPool {
    tx: Option<mpsc::Sender<TurnTask>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
}

impl TurnWorkerPool {
    pub fn start(config: TurnWorkerPoolConfig, engine: Arc<TurnEngine>, sink: Arc<dyn EventSink>) -> Self {
        let (tx, rx) = mpsc::channel::<TurnTask>(config.queue_depth.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let pending = Arc::new(AtomicUsize::new(0));

        let workers = (0..config.worker_count.max(1))
            .map(|worker_index| {
                let rx = rx.clone();
                let engine = engine.clone();
                let sink = sink.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    loop {
                        let task = {
                            let mut guard = rx.lock().await;
                            guard.recv().await
                        };
                        let Some(task) = task else {
                            break;
                        };
                        supervise(worker_index, &engine, &sink, task).await;
                        pending.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        Self {
            tx: Some(tx),
            workers,
            pending,
        }
    }

    /// Submits a task, suspending the caller if the queue is full.
    /// Fails only once the pool has begun shutting down.
    pub async fn enqueue(&self, task: TurnTask) -> Result<(), DomainError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| DomainError::Validation("turn worker pool is shutting down".into()))?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        tx.send(task).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            DomainError::Validation("turn worker pool is shutting down".into())
        })
    }

    /// Closes the queue, waits up to `graceful_drain` for in-flight and
    /// buffered tasks to finish, then cancels any workers still running.
    pub async fn stop(mut self, graceful_drain: Duration) {
        self.tx.take(); // closes the channel: recv() drains the buffer, then returns None

        let remaining = self.pending.clone();
        let handles = std::mem::take(&mut self.workers);
        let joined = futures::future::join_all(handles.into_iter().map(|h| async move {
            let _ = h.await;
        }));

        if tokio::time::timeout(graceful_drain, joined).await.is_err() {
            warn!(
                event = "graceful_shutdown_timeout",
                remaining_depth = remaining.load(Ordering::SeqCst),
                "turn worker pool did not drain within the graceful shutdown budget"
            );
        }
        // Whatever didn't finish above (timeout) or is still registered
        // below (defensive, in case join_all above didn't observe every
        // handle) gets cancelled; cancellation is swallowed, never
        // propagated to the caller.
        for handle in std::mem::take(&mut self.workers) {
            handle.abort();
            let _ = handle.await;
        }
    }
}

/// Runs one task through the engine, catching every error so nothing ever
/// escapes the worker loop (§4.11 error supervision, §7 propagation policy).
async fn supervise(worker_index: usize, engine: &TurnEngine, sink: &Arc<dyn EventSink>, task: TurnTask) {
    let session_id = task.session_id.clone();
    let turn_id = task.turn_id.clone();
    let trace_id = task.trace_id.clone();

    let result = std::panic::AssertUnwindSafe(engine.process(task))
        .catch_unwind()
        .await;

    let error_text = match result {
        Ok(Ok(())) => return,
        Ok(Err(domain_err)) => {
            if domain_err.retryable() {
                warn!(worker = worker_index, error_code = domain_err.error_code(), error = %domain_err, "turn failed with a retryable domain error");
            } else {
                error!(worker = worker_index, error_code = domain_err.error_code(), error = %domain_err, "turn failed with a domain error");
            }
            domain_err.to_string()
        }
        Err(panic) => {
            let message = panic_message(&panic);
            error!(worker = worker_index, panic = %message, "turn worker panicked");
            "예상치 못한 오류가 발생했어요.".to_string()
        }
    };

    let event = StreamEvent::new(session_id, turn_id, trace_id, EventKind::Error, error_text);
    if let Err(e) = sink.publish(event).await {
        error!(worker = worker_index, error = %e, "failed to publish error event for failed turn");
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use turnforge_config::AttachmentsConfig;
    use turnforge_core::TurnEngineConfig;
    use turnforge_model::{ProviderAdapter, ProviderResponse};
    use turnforge_runtime::AttachmentIngestor;
    use turnforge_tools::ToolRegistry;

    struct RecordingSink {
        events: StdMutex<Vec<StreamEvent>>,
    }
    impl RecordingSink {
        fn new() -> Self {
            Self {
                events: StdMutex::new(Vec::new()),
            }
        }
    }
    #[async_trait::async_trait]
    impl EventSink for RecordingSink {
        async fn publish(&self, event: StreamEvent) -> Result<(), turnforge_sink::SinkError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct SleepyProvider {
        name: String,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl ProviderAdapter for SleepyProvider {
        fn name(&self) -> &str {
            &self.name
        }
        async fn generate(
            &self,
            _request: turnforge_model::ProviderRequest,
        ) -> Result<ProviderResponse, turnforge_model::ProviderError> {
            tokio::time::sleep(self.delay).await;
            Ok(ProviderResponse {
                output_text: "done".into(),
                decision_summary: "ok".into(),
                tool_requests: vec![],
            })
        }
    }

    fn task(id: &str) -> TurnTask {
        TurnTask {
            turn_id: id.into(),
            trace_id: format!("trace-{id}"),
            session_id: format!("session-{id}"),
            user_id: "u1".into(),
            text: "hi".into(),
            attachments: vec![],
            provider: "mock".into(),
            model: "m1".into(),
            mcp_enabled: false,
            mcp_profile_name: None,
            subagent_name: None,
        }
    }

    fn make_engine(workspace_root: PathBuf, delay: Duration, event_sink: Arc<dyn EventSink>) -> Arc<TurnEngine> {
        let mut providers: std::collections::HashMap<String, Arc<dyn ProviderAdapter>> =
            std::collections::HashMap::new();
        providers.insert(
            "mock".to_string(),
            Arc::new(SleepyProvider {
                name: "mock".into(),
                delay,
            }),
        );
        let attachment_ingestor = AttachmentIngestor::new(
            AttachmentsConfig {
                download_enabled: false,
                max_bytes: 1024,
                storage_dir: workspace_root.join("attachments"),
            },
            Duration::from_secs(5),
        );
        Arc::new(TurnEngine::new(TurnEngineConfig {
            subagent_base_paths: vec![workspace_root.join("subagents")],
            workspace_root,
            tool_registry: Arc::new(ToolRegistry::new()),
            providers,
            mcp_client: None,
            event_sink,
            attachment_ingestor,
            max_tool_rounds: None,
        }))
    }

    #[tokio::test]
    async fn all_enqueued_tasks_produce_a_terminal_event_and_stop_returns_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::new());

        let pool = TurnWorkerPool::start(
            TurnWorkerPoolConfig {
                worker_count: 2,
                queue_depth: 16,
                graceful_drain: Duration::from_secs(30),
            },
            make_engine(dir.path().to_path_buf(), Duration::from_millis(100), sink.clone()),
            sink.clone(),
        );

        for i in 0..3 {
            pool.enqueue(task(&i.to_string())).await.unwrap();
        }

        let start = std::time::Instant::now();
        pool.stop(Duration::from_secs(30)).await;
        assert!(start.elapsed() < Duration::from_secs(30));

        let events = sink.events.lock().unwrap();
        let finals = events.iter().filter(|e| e.kind == EventKind::Final).count();
        assert_eq!(finals, 3);
    }

    #[tokio::test]
    async fn unknown_provider_surfaces_as_a_single_error_event() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let engine = make_engine(dir.path().to_path_buf(), Duration::from_millis(1), sink.clone());
        let pool = TurnWorkerPool::start(
            TurnWorkerPoolConfig {
                worker_count: 1,
                queue_depth: 4,
                graceful_drain: Duration::from_secs(5),
            },
            engine,
            sink.clone(),
        );

        let mut t = task("1");
        t.provider = "does-not-exist".into();
        pool.enqueue(t).await.unwrap();
        pool.stop(Duration::from_secs(5)).await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.kind == EventKind::Error).count(), 1);
        assert_eq!(events.iter().filter(|e| e.kind == EventKind::Final).count(), 0);
        assert_eq!(events.last().map(|e| e.kind), Some(EventKind::Error));
    }
}
