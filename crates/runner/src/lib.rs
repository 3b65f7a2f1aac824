//! The LoopWright orchestration core.
//!
//! A bounded step loop drives the model through **plan → act → observe**
//! cycles:
//!
//! 1. **Snapshot** the tool registry and submit the conversation
//! 2. **Classify** the decoded output (clean / pseudo-call / malformed)
//! 3. **Dispatch** structured tool calls through the policy gate, in order
//! 4. **Intervene** on degenerate output via the circuit breaker
//! 5. **Terminate** on completion, budget exhaustion, fatal anomaly,
//!    model unavailability, or cancellation — never by hanging
//!
//! The loop always ends with a [`RunReport`] carrying a reason code, the
//! accounting summary, and the full step log.

pub mod anomaly;
pub mod dispatch;
pub mod prompt;
pub mod report;
pub mod step_loop;

pub use anomaly::{
    AnomalyCounters, BreakerAction, BreakerState, CIRCUIT_OPEN_INTERVENTION, CircuitBreaker,
    OutputClass, OutputClassifier, PatternClassifier, RECOVERY_INTERVENTION,
};
pub use dispatch::DispatchGate;
pub use report::{DispatchRecord, RunBudget, RunOutcome, RunReport, StepLog, StepRecord};
pub use step_loop::StepLoop;
