//! Message and Conversation domain types.
//!
//! The conversation is the single source of truth the model sees on every
//! step: model outputs, tool results, and intervention messages all become
//! permanent history entries. Messages are tagged variants rather than a
//! role field so the step loop can match on shape instead of re-scanning
//! strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a run's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A structured tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique call ID (matches the provider's tool_call id)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON mapping
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A structured-looking call wrapper the provider could not decode
/// (e.g. tool-call arguments that are not valid JSON).
///
/// Kept on the model output so the anomaly detector can classify the step
/// without re-parsing the wire response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidCallPayload {
    /// The raw payload as received
    pub payload: String,

    /// Why decoding failed
    pub error: String,
}

/// One decoded model completion: free text plus the ordered structured
/// tool calls (and any call wrappers that failed to decode).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// Free-form assistant text
    pub text: String,

    /// Structured tool calls, in the order the model emitted them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Call wrappers that could not be decoded into requests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_payloads: Vec<InvalidCallPayload>,
}

impl ModelOutput {
    /// A text-only output.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: content.into(),
            tool_calls: Vec::new(),
            invalid_payloads: Vec::new(),
        }
    }

    /// An output carrying structured tool calls.
    pub fn with_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: content.into(),
            tool_calls: calls,
            invalid_payloads: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Severity of an intervention injected by the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionSeverity {
    /// A plain recovery message explaining the correct call mechanism
    Recovery,
    /// The single circuit-open escalation demanding a changed strategy
    Critical,
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// System instructions (task framing, tool rules)
    System { content: String },

    /// The task or a user turn
    User { content: String },

    /// A decoded model completion
    ModelOutput(ModelOutput),

    /// Closure for one tool call the model made — appended for every
    /// requested call regardless of outcome
    ToolResult {
        call_id: String,
        tool_name: String,
        content: String,
    },

    /// A corrective message injected by the circuit breaker; permanent
    /// history, never removed within a run
    Intervention {
        severity: InterventionSeverity,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
        }
    }

    pub fn intervention(severity: InterventionSeverity, content: impl Into<String>) -> Self {
        Self::Intervention {
            severity,
            content: content.into(),
        }
    }

    /// The wire-level role this message maps to.
    pub fn role_name(&self) -> &'static str {
        match self {
            Self::System { .. } | Self::Intervention { .. } => "system",
            Self::User { .. } => "user",
            Self::ModelOutput(_) => "assistant",
            Self::ToolResult { .. } => "tool",
        }
    }
}

/// An append-only ordered sequence of messages.
///
/// Invariant: no message is ever mutated or removed after being appended.
/// The model's only signal about prior anomalies is what appears here, so
/// interventions stay in the history for the rest of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
        }
    }

    /// Create a conversation seeded with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.append(Message::system(prompt));
        conv
    }

    /// Append a message to the history. Never reorders or drops.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The current ordered history, for submission to the model.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Count messages of a given shape (used by tests and summaries).
    pub fn count_tool_results(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m, Message::ToolResult { .. }))
            .count()
    }

    /// Rough token estimate (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| match m {
                Message::System { content }
                | Message::User { content }
                | Message::ToolResult { content, .. }
                | Message::Intervention { content, .. } => content.len() / 4,
                Message::ModelOutput(out) => out.text.len() / 4,
            })
            .sum()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
