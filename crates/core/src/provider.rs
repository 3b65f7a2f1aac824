//! Provider trait — the abstraction over the model completion collaborator.
//!
//! The step loop supplies the full message history and the current tool
//! schema list on every call; it never relies on the collaborator retaining
//! state between calls.

use crate::error::ModelError;
use crate::message::{Message, ModelOutput};
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One completion request: the conversation snapshot plus tool schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// The full conversation snapshot
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may call, from the step's registry snapshot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response from the model collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The decoded output (free text + structured tool calls)
    pub output: ModelOutput,

    /// Token usage, when the provider reports it
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// The model completion collaborator.
///
/// Implementations wrap a concrete endpoint (OpenAI-compatible HTTP, a
/// scripted mock in tests). The loop calls `complete()` without knowing
/// which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a decoded completion.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, ModelError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ModelError> {
        Ok(true)
    }
}
