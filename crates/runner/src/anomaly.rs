//! Anomaly detection and the circuit breaker.
//!
//! The detector classifies each decoded model output; the breaker decides
//! how the loop reacts. Repeating the same recovery message forever
//! degrades the model's effective context, so remediation is a bounded
//! state machine: a few recovery messages, then one qualitatively stronger
//! intervention, then termination.

use loopwright_core::message::ModelOutput;
use regex_lite::Regex;

/// Classification of one model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputClass {
    /// Dispatchable tool calls, a completion signal, or plain conversation
    Clean,
    /// The text describes a tool invocation instead of emitting one
    PseudoCall,
    /// A structured-looking call wrapper that could not be decoded
    MalformedSyntax,
}

impl OutputClass {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Short name for events and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::PseudoCall => "pseudo_call",
            Self::MalformedSyntax => "malformed_syntax",
        }
    }
}

/// Pluggable output classifier.
///
/// The pseudo-call grammar is inherently heuristic and model-specific, so
/// the detector is a trait with a pattern-based default rather than a fixed
/// algorithm.
pub trait OutputClassifier: Send + Sync {
    fn classify(&self, output: &ModelOutput, known_tools: &[String]) -> OutputClass;
}

/// The default classifier: regex shapes over the free text, applied only
/// when the output carries no dispatchable structured call.
pub struct PatternClassifier {
    shapes: Vec<Regex>,
}

impl PatternClassifier {
    pub fn new() -> Self {
        // Call-like shapes observed across providers: a JSON call object,
        // an XML call tag, a fenced block opening on a call object.
        let patterns = [
            r#"\{\s*"(?:name|tool|function)"\s*:"#,
            r"</?tool_call>",
            r"</?function(?:_call)?[> ]",
            r#"```(?:json)?\s*\{\s*"(?:name|tool|function)""#,
        ];
        let shapes = patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self { shapes }
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputClassifier for PatternClassifier {
    fn classify(&self, output: &ModelOutput, known_tools: &[String]) -> OutputClass {
        // Structured calls are dispatchable: the step is clean no matter
        // what the accompanying text looks like.
        if output.has_tool_calls() {
            return OutputClass::Clean;
        }

        if !output.invalid_payloads.is_empty() {
            return OutputClass::MalformedSyntax;
        }

        let text = &output.text;
        if self.shapes.iter().any(|re| re.is_match(text)) {
            return OutputClass::PseudoCall;
        }

        // Invocation syntax on a known tool name, e.g. `read_file(path=...)`.
        for tool in known_tools {
            if let Ok(re) = Regex::new(&format!(r"\b{tool}\s*\(")) {
                if re.is_match(text) {
                    return OutputClass::PseudoCall;
                }
            }
        }

        OutputClass::Clean
    }
}

/// Consecutive-anomaly counters. Created at run start, discarded at run
/// end; reset whenever a step is clean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnomalyCounters {
    pub pseudo_calls: u32,
    pub malformed_syntax: u32,
    pub tool_errors: u32,
}

impl AnomalyCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Breaker state, per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Normal,
    /// `n` consecutive anomalous steps, each answered with a recovery
    /// message
    Warned(u32),
    /// The single critical intervention has been sent; `grace_used` further
    /// anomalous steps have been tolerated since
    CircuitOpen { grace_used: u32 },
}

/// What the loop must do after observing a classified step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerAction {
    /// Carry on (clean step, or open-circuit grace)
    Proceed,
    /// Append a recovery intervention
    Warn { consecutive: u32 },
    /// Append the single critical intervention
    OpenCircuit,
    /// Terminate the run as a fatal anomaly
    Abort,
}

/// The circuit breaker state machine.
///
/// Transitions are structurally bounded: at most `warning_threshold - 1`
/// recovery messages, exactly one circuit-open message, and termination
/// after `fatal_grace` further anomalous steps.
pub struct CircuitBreaker {
    warning_threshold: u32,
    fatal_grace: u32,
    state: BreakerState,
    counters: AnomalyCounters,
}

impl CircuitBreaker {
    pub fn new(warning_threshold: u32, fatal_grace: u32) -> Self {
        Self {
            warning_threshold: warning_threshold.max(1),
            fatal_grace: fatal_grace.max(1),
            state: BreakerState::Normal,
            counters: AnomalyCounters::default(),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn counters(&self) -> AnomalyCounters {
        self.counters
    }

    /// Observe one classified step and decide the loop's reaction.
    pub fn observe(&mut self, class: OutputClass) -> BreakerAction {
        match class {
            OutputClass::Clean => {
                self.counters.reset();
                self.state = BreakerState::Normal;
                BreakerAction::Proceed
            }
            anomaly => {
                match anomaly {
                    OutputClass::PseudoCall => self.counters.pseudo_calls += 1,
                    OutputClass::MalformedSyntax => self.counters.malformed_syntax += 1,
                    OutputClass::Clean => unreachable!(),
                }

                match self.state {
                    BreakerState::Normal if self.warning_threshold == 1 => {
                        self.state = BreakerState::CircuitOpen { grace_used: 0 };
                        BreakerAction::OpenCircuit
                    }
                    BreakerState::Normal => {
                        self.state = BreakerState::Warned(1);
                        BreakerAction::Warn { consecutive: 1 }
                    }
                    BreakerState::Warned(n) if n + 1 >= self.warning_threshold => {
                        self.state = BreakerState::CircuitOpen { grace_used: 0 };
                        BreakerAction::OpenCircuit
                    }
                    BreakerState::Warned(n) => {
                        self.state = BreakerState::Warned(n + 1);
                        BreakerAction::Warn { consecutive: n + 1 }
                    }
                    BreakerState::CircuitOpen { grace_used } => {
                        if grace_used + 1 >= self.fatal_grace {
                            BreakerAction::Abort
                        } else {
                            self.state = BreakerState::CircuitOpen {
                                grace_used: grace_used + 1,
                            };
                            BreakerAction::Proceed
                        }
                    }
                }
            }
        }
    }

    /// Track consecutive tool-execution failures: a step whose dispatches
    /// all failed increments the counter; any successfully executed call
    /// resets it.
    pub fn note_tool_step(&mut self, any_success: bool, any_dispatched: bool) {
        if any_success {
            self.counters.tool_errors = 0;
        } else if any_dispatched {
            self.counters.tool_errors += 1;
        }
    }
}

/// The recovery message: explains the correct mechanism. Appended at most
/// `warning_threshold - 1` times per anomaly streak.
pub const RECOVERY_INTERVENTION: &str = "\
Your last reply described a tool call in plain text instead of invoking one. \
Text like JSON objects, XML tags, or `tool_name(...)` does nothing — no tool \
runs. To act, emit a structured tool call through the tools interface, \
exactly as listed in the tool schemas. If the task is finished, call \
`task_complete` with a summary. Reply now with either a structured tool call \
or a plain-text answer with no call syntax.";

/// The single circuit-open escalation. Qualitatively different from the
/// recovery message: demands acknowledgment and a changed strategy.
pub const CIRCUIT_OPEN_INTERVENTION: &str = "\
STOP. You have repeatedly written tool calls as text after being told this \
does nothing. Those replies executed no tools and made no progress. Before \
anything else: (1) acknowledge in one sentence that your previous replies \
invoked no tools, (2) state which single tool you will invoke next and why, \
(3) emit that one call through the tools interface — structured, not text. \
If you cannot do this, call `task_complete` and report the task as blocked. \
Another reply without a structured call ends this run.";
