//! The step loop controller — the heart of LoopWright.
//!
//! Drives the plan → act → observe cycle:
//!
//! 1. Snapshot the tool registry and submit the conversation to the model
//! 2. Classify the decoded output (anomaly detector)
//! 3. Clean output with tool calls: dispatch them in order through the gate
//! 4. Clean output with a completion signal: terminate `Completed`
//! 5. Anomalous output: intervene per the circuit breaker, or abort
//! 6. Repeat until a terminal outcome or the step budget runs out
//!
//! Every terminal path returns a [`RunReport`]; the loop itself never
//! returns an error and never hangs (the model call and every tool
//! execution are timeout-bounded).

use crate::anomaly::{
    BreakerAction, CIRCUIT_OPEN_INTERVENTION, CircuitBreaker, OutputClassifier, PatternClassifier,
    RECOVERY_INTERVENTION,
};
use crate::dispatch::DispatchGate;
use crate::report::{DispatchRecord, RunBudget, RunOutcome, RunReport, StepLog, StepRecord};
use chrono::Utc;
use loopwright_core::error::ModelError;
use loopwright_core::event::{EventBus, RunEvent};
use loopwright_core::message::{Conversation, InterventionSeverity, Message};
use loopwright_core::provider::{Completion, CompletionRequest, Provider};
use loopwright_core::tool::{RegistrySnapshot, SharedRegistry, ToolExecutionOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How a model call attempt sequence ended without a completion.
enum CallEnd {
    Cancelled,
    Unavailable(ModelError),
}

/// The step loop controller.
pub struct StepLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    registry: SharedRegistry,
    classifier: Box<dyn OutputClassifier>,
    budget: RunBudget,
    warning_threshold: u32,
    fatal_grace: u32,
    model_timeout: Duration,
    tool_timeout: Duration,
    model_retries: u32,
    retry_backoff: Duration,
    events: Arc<EventBus>,
    cancel: Option<watch::Receiver<bool>>,
}

impl StepLoop {
    /// Create a step loop with default budgets and thresholds.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        registry: SharedRegistry,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            registry,
            classifier: Box::new(PatternClassifier::new()),
            budget: RunBudget::default(),
            warning_threshold: 3,
            fatal_grace: 1,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            model_retries: 2,
            retry_backoff: Duration::from_millis(500),
            events,
            cancel: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_budget(mut self, budget: RunBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the anomaly thresholds: recovery messages until `warning_threshold`
    /// consecutive anomalies open the circuit, then `fatal_grace` further
    /// anomalous steps before the run aborts.
    pub fn with_thresholds(mut self, warning_threshold: u32, fatal_grace: u32) -> Self {
        self.warning_threshold = warning_threshold;
        self.fatal_grace = fatal_grace;
        self
    }

    pub fn with_timeouts(mut self, model_timeout: Duration, tool_timeout: Duration) -> Self {
        self.model_timeout = model_timeout;
        self.tool_timeout = tool_timeout;
        self
    }

    pub fn with_retries(mut self, model_retries: u32, retry_backoff: Duration) -> Self {
        self.model_retries = model_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    /// Swap in a different output classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn OutputClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Wire an external cancellation signal. Honoured between steps and
    /// while a model call is in flight.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run the loop to a terminal outcome.
    pub async fn run(&self, conversation: &mut Conversation) -> RunReport {
        let gate = DispatchGate::new(self.tool_timeout);
        let mut breaker = CircuitBreaker::new(self.warning_threshold, self.fatal_grace);
        let mut log: StepLog = Vec::new();
        let mut tools_executed: u32 = 0;
        let mut last_executed_tool: Option<String> = None;

        info!(
            conversation_id = %conversation.id,
            max_steps = self.budget.max_steps,
            "Starting run"
        );

        for step in 1..=self.budget.max_steps {
            if self.cancelled() {
                return self.finish(RunOutcome::Cancelled, step - 1, tools_executed, log);
            }

            self.events.publish(RunEvent::StepStarted { step });
            debug!(step, "Step started");

            let snapshot = self.registry.read().unwrap().snapshot();

            let completion = match self.call_model(conversation, &snapshot).await {
                Ok(completion) => completion,
                Err(CallEnd::Cancelled) => {
                    // Cancellation appends nothing further.
                    return self.finish(RunOutcome::Cancelled, step - 1, tools_executed, log);
                }
                Err(CallEnd::Unavailable(e)) => {
                    warn!(step, error = %e, "Model unavailable after retries");
                    return self.finish(RunOutcome::ModelUnavailable, step - 1, tools_executed, log);
                }
            };

            let output = completion.output;
            let class = self.classifier.classify(&output, &snapshot.names());
            conversation.append(Message::ModelOutput(output.clone()));

            let mut dispatches: Vec<DispatchRecord> = Vec::new();
            let mut completed = false;

            match breaker.observe(class) {
                BreakerAction::Warn { consecutive } => {
                    warn!(step, class = class.name(), consecutive, "Anomalous output");
                    conversation.append(Message::intervention(
                        InterventionSeverity::Recovery,
                        RECOVERY_INTERVENTION,
                    ));
                    self.events.publish(RunEvent::AnomalyWarned {
                        step,
                        class: class.name().into(),
                        consecutive,
                    });
                }
                BreakerAction::OpenCircuit => {
                    warn!(step, "Circuit opened — critical intervention");
                    conversation.append(Message::intervention(
                        InterventionSeverity::Critical,
                        CIRCUIT_OPEN_INTERVENTION,
                    ));
                    self.events.publish(RunEvent::CircuitOpened { step });
                }
                BreakerAction::Abort => {
                    log.push(StepRecord {
                        step,
                        output,
                        dispatches,
                        timestamp: Utc::now(),
                    });
                    return self.finish(RunOutcome::AnomalyAborted, step, tools_executed, log);
                }
                BreakerAction::Proceed => {
                    if class.is_clean() && output.has_tool_calls() {
                        // Sequential, in emitted order: later calls may
                        // depend on earlier side effects.
                        for (index, call) in output.tool_calls.iter().enumerate() {
                            let outcome = if (index as u32) >= self.budget.max_tools_per_step {
                                ToolExecutionOutcome::SkippedBudget {
                                    reason: format!(
                                        "step tool budget of {} exhausted",
                                        self.budget.max_tools_per_step
                                    ),
                                }
                            } else {
                                self.events.publish(RunEvent::ToolDispatched {
                                    step,
                                    call_id: call.id.clone(),
                                    tool: call.name.clone(),
                                });
                                let started = Instant::now();
                                let outcome = gate
                                    .execute(call, &snapshot, last_executed_tool.as_deref())
                                    .await;
                                self.events.publish(RunEvent::ToolCompleted {
                                    step,
                                    call_id: call.id.clone(),
                                    tool: call.name.clone(),
                                    outcome: outcome.kind().into(),
                                    duration_ms: started.elapsed().as_millis() as u64,
                                });
                                tools_executed += 1;
                                last_executed_tool = Some(call.name.clone());
                                outcome
                            };

                            if matches!(outcome, ToolExecutionOutcome::Success { halt: true, .. }) {
                                completed = true;
                            }

                            // Closure for every requested call, whatever
                            // the outcome.
                            conversation.append(Message::tool_result(
                                call.id.clone(),
                                call.name.clone(),
                                outcome.result_content(),
                            ));
                            dispatches.push(DispatchRecord {
                                call_id: call.id.clone(),
                                tool: call.name.clone(),
                                outcome,
                            });
                        }

                        let any_success = dispatches.iter().any(|d| d.outcome.is_success());
                        let any_dispatched = dispatches
                            .iter()
                            .any(|d| !matches!(d.outcome, ToolExecutionOutcome::SkippedBudget { .. }));
                        breaker.note_tool_step(any_success, any_dispatched);
                    }
                    // A clean step with no calls and no completion signal is
                    // a plain conversational turn: appended, loop continues.
                }
            }

            log.push(StepRecord {
                step,
                output,
                dispatches,
                timestamp: Utc::now(),
            });

            if completed {
                return self.finish(RunOutcome::Completed, step, tools_executed, log);
            }
        }

        self.finish(
            RunOutcome::BudgetExhausted,
            self.budget.max_steps,
            tools_executed,
            log,
        )
    }

    /// Call the model with timeout, cancellation, and bounded retry.
    async fn call_model(
        &self,
        conversation: &Conversation,
        snapshot: &RegistrySnapshot,
    ) -> Result<Completion, CallEnd> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: conversation.snapshot().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: snapshot.definitions(),
        };

        let mut attempt: u32 = 0;
        loop {
            if self.cancelled() {
                return Err(CallEnd::Cancelled);
            }

            let result = tokio::select! {
                _ = wait_cancelled(self.cancel.clone()) => return Err(CallEnd::Cancelled),
                result = tokio::time::timeout(
                    self.model_timeout,
                    self.provider.complete(request.clone()),
                ) => result,
            };

            let error = match result {
                Ok(Ok(completion)) => return Ok(completion),
                Ok(Err(e)) => e,
                Err(_) => ModelError::Timeout {
                    timeout_secs: self.model_timeout.as_secs(),
                },
            };

            if attempt >= self.model_retries {
                return Err(CallEnd::Unavailable(error));
            }

            let backoff = self.retry_backoff * 2u32.saturating_pow(attempt);
            warn!(
                attempt = attempt + 1,
                error = %error,
                backoff_ms = backoff.as_millis() as u64,
                "Model call failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    fn finish(
        &self,
        outcome: RunOutcome,
        steps_taken: u32,
        tools_executed: u32,
        log: StepLog,
    ) -> RunReport {
        self.events.publish(RunEvent::RunCompleted {
            reason: outcome.reason_code().into(),
            steps: steps_taken,
            tools_executed,
        });
        let report = RunReport::new(outcome, steps_taken, tools_executed, log);
        info!(reason = outcome.reason_code(), "{}", report.summary);
        report
    }
}

/// Resolves when the cancellation signal turns true; pends forever when no
/// signal is wired (or its sender is gone).
async fn wait_cancelled(cancel: Option<watch::Receiver<bool>>) {
    match cancel {
        Some(mut rx) => {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
