//! The agent reasoning loop — classify, reason, act, checkpoint.
//!
//! One `run` handles one user query:
//!
//! 1. Classify the query; informational queries skip tool loading entirely
//! 2. Ask the model for a completion (with the tool schemas when loaded)
//! 3. If tool calls are requested: invoke each in request order, record a
//!    checkpoint step per call, feed the results back, and loop
//! 4. If the model answers in text: the run is `Done`
//!
//! The iteration cap is a hard ceiling. Hitting it resolves to `Partial`
//! when any step succeeded (the checkpoint becomes a user-facing report) or
//! `Failed` otherwise. A single tool failure never ends the run — the model
//! sees the error text and decides whether to retry, pivot, or give up.
//! The checkpoint is persisted on every terminal transition, including
//! cancellation, so partial progress is never silently lost.

use crate::classifier::{QueryClassifier, QueryMode};
use crate::lazy::LazyToolset;
use chrono::Utc;
use irontask_checkpoint::{task_id_for, Checkpoint, CheckpointStore, PartialReport, StopReason};
use irontask_config::RuntimeConfig;
use irontask_core::event::{DomainEvent, EventBus};
use irontask_core::message::{Conversation, Message};
use irontask_core::provider::{Provider, ProviderRequest};
use irontask_core::tool::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The terminal result of one agent run — the only contract the
/// surrounding CLI/web layer consumes.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The model produced a final answer
    Done { task_id: String, answer: String },
    /// No final answer, but some steps succeeded
    Partial { task_id: String, report: PartialReport },
    /// Nothing usable was produced
    Failed { task_id: String, message: String },
}

impl RunOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RunOutcome::Done { .. } => "done",
            RunOutcome::Partial { .. } => "partial",
            RunOutcome::Failed { .. } => "failed",
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            RunOutcome::Done { task_id, .. }
            | RunOutcome::Partial { task_id, .. }
            | RunOutcome::Failed { task_id, .. } => task_id,
        }
    }
}

/// Truncation width for tool-argument text in checkpoint step labels.
const LABEL_ARGS_MAX_CHARS: usize = 48;

/// The core agent loop.
///
/// All collaborators are injected at construction; the loop holds no global
/// state and one instance can serve concurrent runs (each run owns its own
/// conversation and checkpoint).
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    toolset: Arc<LazyToolset>,
    store: Arc<dyn CheckpointStore>,
    event_bus: Arc<EventBus>,
    classifier: QueryClassifier,
    config: RuntimeConfig,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        toolset: Arc<LazyToolset>,
        store: Arc<dyn CheckpointStore>,
        config: RuntimeConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            toolset,
            store,
            event_bus,
            classifier: QueryClassifier::new(),
            config,
        }
    }

    /// Process a query to a terminal outcome.
    pub async fn run(&self, query: &str) -> RunOutcome {
        self.run_cancellable(query, CancellationToken::new()).await
    }

    /// Process a query, aborting at the next suspension point when `cancel`
    /// fires. An aborted run still persists its checkpoint.
    pub async fn run_cancellable(&self, query: &str, cancel: CancellationToken) -> RunOutcome {
        let task_id = task_id_for(query);
        let mut checkpoint = Checkpoint::with_task_id(&task_id);

        let mode = self.classifier.classify(query);
        info!(task_id = %task_id, mode = mode.as_str(), "Run started");
        self.event_bus.publish(DomainEvent::RunStarted {
            task_id: task_id.clone(),
            mode: mode.as_str().into(),
            timestamp: Utc::now(),
        });

        // Lazy trigger: only action queries materialize the registry.
        let registry: Option<Arc<ToolRegistry>> = match mode {
            QueryMode::Action => Some(self.toolset.get_or_discover().await),
            QueryMode::Informational => None,
        };
        let tool_definitions = registry
            .as_ref()
            .map(|r| r.definitions())
            .unwrap_or_default();

        let model = self.config.model_for(mode.as_str()).to_string();
        let model_timeout = Duration::from_secs(self.config.limits.model_timeout_secs);
        let mut conversation = Conversation::for_query(&self.config.system_prompt, query);

        let max_iterations = self.config.limits.max_iterations;
        let mut iteration = 0u32;

        while iteration < max_iterations {
            iteration += 1;
            debug!(task_id = %task_id, iteration, max_iterations, "Loop iteration");

            if cancel.is_cancelled() {
                return self.finish(checkpoint, iteration, StopReason::Cancelled).await;
            }

            let request = ProviderRequest::new(
                model.clone(),
                conversation.messages.clone(),
                tool_definitions.clone(),
            );

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.finish(checkpoint, iteration, StopReason::Cancelled).await;
                }
                attempt = tokio::time::timeout(model_timeout, self.provider.complete(request)) => {
                    match attempt {
                        Ok(Ok(response)) => response,
                        Ok(Err(e)) => {
                            warn!(task_id = %task_id, error = %e, "Model capability failed");
                            return self
                                .finish(checkpoint, iteration, StopReason::ModelFailure(e.to_string()))
                                .await;
                        }
                        Err(_) => {
                            warn!(task_id = %task_id, timeout_secs = model_timeout.as_secs(), "Model call timed out");
                            return self
                                .finish(
                                    checkpoint,
                                    iteration,
                                    StopReason::ModelFailure(format!(
                                        "completion timed out after {}s",
                                        model_timeout.as_secs()
                                    )),
                                )
                                .await;
                        }
                    }
                }
            };

            if let Some(usage) = &response.usage {
                self.event_bus.publish(DomainEvent::CompletionReceived {
                    task_id: task_id.clone(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: Utc::now(),
                });
            }

            // No tool calls — this is the final answer.
            if response.message.tool_calls.is_empty() {
                let answer = response.message.content.clone();
                conversation.push(response.message);
                info!(task_id = %task_id, iterations = iteration, "Run completed");
                self.persist(&checkpoint).await;
                self.event_bus.publish(DomainEvent::RunFinished {
                    task_id: task_id.clone(),
                    status: "done".into(),
                    iterations: iteration,
                    timestamp: Utc::now(),
                });
                return RunOutcome::Done { task_id, answer };
            }

            // Execute requested tool calls sequentially, in request order.
            let tool_calls = response.message.tool_calls.clone();
            conversation.push(response.message);

            for tc in &tool_calls {
                if cancel.is_cancelled() {
                    return self.finish(checkpoint, iteration, StopReason::Cancelled).await;
                }

                let arguments: serde_json::Value =
                    serde_json::from_str(&tc.arguments).unwrap_or_default();
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };
                let label = step_label(&tc.name, &tc.arguments);

                let started = std::time::Instant::now();
                let result = match &registry {
                    Some(registry) => registry.invoke(&call).await,
                    // The model requested a tool on a no-tools run; answer
                    // with an error result so it can recover in text.
                    None => ToolResult::error("No tools are available for this query"),
                };
                let duration_ms = started.elapsed().as_millis() as u64;

                // A structured error result counts as a failed step exactly
                // like a raised error would.
                let succeeded = !result.is_error();
                checkpoint.record(&label, result.output.clone(), succeeded);

                self.event_bus.publish(DomainEvent::ToolInvoked {
                    task_id: task_id.clone(),
                    tool_name: tc.name.clone(),
                    succeeded,
                    duration_ms,
                    timestamp: Utc::now(),
                });

                let payload =
                    serde_json::to_string(&result).unwrap_or_else(|_| result.output.clone());
                conversation.push(Message::tool_result(&tc.id, payload));
            }
        }

        warn!(task_id = %task_id, max_iterations, "Iteration cap reached without final answer");
        self.finish(
            checkpoint,
            max_iterations,
            StopReason::IterationsExhausted { max_iterations },
        )
        .await
    }

    /// Resolve a run that ended without a final answer: `Partial` when any
    /// step succeeded, `Failed` otherwise. Persists the checkpoint either way.
    async fn finish(
        &self,
        checkpoint: Checkpoint,
        iterations: u32,
        reason: StopReason,
    ) -> RunOutcome {
        self.persist(&checkpoint).await;

        let task_id = checkpoint.task_id.clone();
        let outcome = if checkpoint.has_any_success() {
            RunOutcome::Partial {
                task_id: task_id.clone(),
                report: PartialReport::from_checkpoint(&checkpoint, &reason),
            }
        } else {
            let message = match &reason {
                StopReason::IterationsExhausted { .. } => {
                    "I could not complete the task within the iteration limit."
                }
                StopReason::ModelFailure(_) => "The language model is currently unavailable.",
                StopReason::Cancelled => "The run was cancelled before any progress was made.",
            };
            RunOutcome::Failed {
                task_id: task_id.clone(),
                message: format!("{message} (task id: {task_id})"),
            }
        };

        self.event_bus.publish(DomainEvent::RunFinished {
            task_id,
            status: outcome.status().into(),
            iterations,
            timestamp: Utc::now(),
        });
        outcome
    }

    /// Persist the checkpoint. Storage trouble is logged, never fatal — the
    /// outcome still reaches the caller.
    async fn persist(&self, checkpoint: &Checkpoint) {
        match self.store.save(checkpoint).await {
            Ok(()) => {
                self.event_bus.publish(DomainEvent::CheckpointSaved {
                    task_id: checkpoint.task_id.clone(),
                    steps: checkpoint.steps.len(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!(task_id = %checkpoint.task_id, error = %e, "Failed to persist checkpoint");
            }
        }
    }
}

/// Step label for the checkpoint: `tool_name(truncated args)`.
fn step_label(name: &str, arguments: &str) -> String {
    let args = arguments.trim();
    if args.chars().count() <= LABEL_ARGS_MAX_CHARS {
        format!("{name}({args})")
    } else {
        let truncated: String = args.chars().take(LABEL_ARGS_MAX_CHARS).collect();
        format!("{name}({truncated}...)")
    }
}
