//! Run accounting: budgets, the per-run step log, and the terminal report.

use chrono::{DateTime, Utc};
use loopwright_core::message::ModelOutput;
use loopwright_core::tool::ToolExecutionOutcome;
use serde::{Deserialize, Serialize};

/// Hard limits for one run. Constant for the run's lifetime; exceeding a
/// budget is a terminal condition, not an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunBudget {
    /// Maximum steps per run
    pub max_steps: u32,

    /// Maximum tool dispatches per step
    pub max_tools_per_step: u32,
}

impl RunBudget {
    pub fn new(max_steps: u32, max_tools_per_step: u32) -> Self {
        Self {
            max_steps: max_steps.max(1),
            max_tools_per_step: max_tools_per_step.max(1),
        }
    }
}

impl Default for RunBudget {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_tools_per_step: 8,
        }
    }
}

/// One routed tool call and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub call_id: String,
    pub tool: String,
    pub outcome: ToolExecutionOutcome,
}

/// One step of the run: the model output consumed and the dispatches it
/// produced. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: u32,
    pub output: ModelOutput,
    pub dispatches: Vec<DispatchRecord>,
    pub timestamp: DateTime<Utc>,
}

/// The per-run log of step records.
pub type StepLog = Vec<StepRecord>;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The model signalled completion via the completion tool
    Completed,
    /// The step budget ran out before completion
    BudgetExhausted,
    /// The circuit breaker's fatal escalation fired
    AnomalyAborted,
    /// The model collaborator stayed unreachable through the retry budget
    ModelUnavailable,
    /// An external cancellation signal was honoured
    Cancelled,
}

impl RunOutcome {
    /// Machine-checkable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::BudgetExhausted => "budget_exhausted",
            Self::AnomalyAborted => "anomaly_aborted",
            Self::ModelUnavailable => "model_unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

/// The terminal result of one run: outcome, accounting, and the full step
/// log for diagnosis. No outcome silently drops context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub steps_taken: u32,
    pub tools_executed: u32,
    /// Human-readable summary of the run
    pub summary: String,
    pub log: StepLog,
}

impl RunReport {
    pub fn new(outcome: RunOutcome, steps_taken: u32, tools_executed: u32, log: StepLog) -> Self {
        let summary = match outcome {
            RunOutcome::Completed => format!(
                "Task complete: executed {tools_executed} tool call(s) across {steps_taken} step(s)"
            ),
            RunOutcome::BudgetExhausted => format!(
                "Step budget exhausted after {steps_taken} step(s); {tools_executed} tool call(s) executed. Task may be incomplete."
            ),
            RunOutcome::AnomalyAborted => format!(
                "Run aborted after {steps_taken} step(s): the model kept emitting non-dispatchable output after escalation."
            ),
            RunOutcome::ModelUnavailable => format!(
                "Model endpoint unavailable after retries; stopped at step {steps_taken}."
            ),
            RunOutcome::Cancelled => {
                format!("Run cancelled at step {steps_taken}; {tools_executed} tool call(s) had executed.")
            }
        };
        Self {
            outcome,
            steps_taken,
            tools_executed,
            summary,
            log,
        }
    }
}
