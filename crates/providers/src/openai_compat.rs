//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks AI,
//! and any other OpenAI-compatible `/chat/completions` endpoint.
//!
//! Tool-call arguments arrive as JSON-encoded strings; a call whose
//! arguments fail to decode is surfaced as an invalid payload on the
//! returned [`ModelOutput`] rather than dropped, so the anomaly detector
//! can see exactly what the model emitted.

use async_trait::async_trait;
use loopwright_core::error::ModelError;
use loopwright_core::message::{InvalidCallPayload, Message, ModelOutput, ToolCallRequest};
use loopwright_core::provider::{Completion, CompletionRequest, Provider, Usage};
use loopwright_core::tool::ToolDefinition;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible model client.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new OpenAI-compatible client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenRouter client (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama client (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert conversation messages to the OpenAI wire format.
    ///
    /// Interventions go over the wire as `system` messages so the
    /// correction carries maximum salience.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| match m {
                Message::System { content } | Message::Intervention { content, .. } => {
                    ApiMessage {
                        role: "system".into(),
                        content: Some(content.clone()),
                        tool_calls: None,
                        tool_call_id: None,
                    }
                }
                Message::User { content } => ApiMessage {
                    role: "user".into(),
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                Message::ModelOutput(out) => ApiMessage {
                    role: "assistant".into(),
                    content: Some(out.text.clone()),
                    tool_calls: if out.tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            out.tool_calls
                                .iter()
                                .map(|tc| ApiToolCall {
                                    id: tc.id.clone(),
                                    r#type: "function".into(),
                                    function: ApiFunction {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.to_string(),
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: None,
                },
                Message::ToolResult {
                    call_id, content, ..
                } => ApiMessage {
                    role: "tool".into(),
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(call_id.clone()),
                },
            })
            .collect()
    }

    /// Convert tool definitions to the OpenAI wire format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Decode the assistant message of a completion choice.
    ///
    /// Calls with undecodable argument JSON (or no name) become invalid
    /// payloads on the output instead of being silently discarded.
    fn decode_message(api: ApiMessage) -> ModelOutput {
        let mut output = ModelOutput::text(api.content.unwrap_or_default());

        for tc in api.tool_calls.unwrap_or_default() {
            if tc.function.name.is_empty() {
                output.invalid_payloads.push(InvalidCallPayload {
                    payload: tc.function.arguments.clone(),
                    error: "tool call without a function name".into(),
                });
                continue;
            }

            // Some models send an empty string for a no-argument call.
            let raw = if tc.function.arguments.trim().is_empty() {
                "{}"
            } else {
                tc.function.arguments.as_str()
            };

            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(arguments) if arguments.is_object() => {
                    output
                        .tool_calls
                        .push(ToolCallRequest::new(tc.id, tc.function.name, arguments));
                }
                Ok(other) => {
                    output.invalid_payloads.push(InvalidCallPayload {
                        payload: format!("{}({})", tc.function.name, other),
                        error: "arguments are not a JSON object".into(),
                    });
                }
                Err(e) => {
                    output.invalid_payloads.push(InvalidCallPayload {
                        payload: format!("{}({})", tc.function.name, tc.function.arguments),
                        error: format!("argument JSON failed to parse: {e}"),
                    });
                }
            }
        }

        output
    }
}

#[async_trait]
impl Provider for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ModelError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ModelError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ModelError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::MalformedResponse("No choices in response".into()))?;

        let output = Self::decode_message(choice.message);

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Completion {
            output,
            usage,
            model: api_response.model,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ModelError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopwright_core::message::InterventionSeverity;

    #[test]
    fn openrouter_constructor() {
        let client = OpenAiCompatClient::openrouter("sk-test");
        assert_eq!(client.name(), "openrouter");
        assert!(client.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let client = OpenAiCompatClient::ollama(None);
        assert_eq!(client.name(), "ollama");
        assert!(client.base_url.contains("localhost:11434"));
    }

    #[test]
    fn message_conversion_basic_roles() {
        let messages = vec![
            Message::system("You are a task runner"),
            Message::user("List files"),
        ];
        let api_messages = OpenAiCompatClient::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn intervention_maps_to_system_role() {
        let messages = vec![Message::intervention(
            InterventionSeverity::Critical,
            "Stop writing calls as text.",
        )];
        let api_messages = OpenAiCompatClient::to_api_messages(&messages);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(
            api_messages[0].content.as_deref(),
            Some("Stop writing calls as text.")
        );
    }

    #[test]
    fn model_output_conversion_with_tool_calls() {
        let out = ModelOutput::with_calls(
            "checking",
            vec![ToolCallRequest::new(
                "call_1",
                "read_file",
                serde_json::json!({"path": "main.rs"}),
            )],
        );
        let api_msgs = OpenAiCompatClient::to_api_messages(&[Message::ModelOutput(out)]);
        assert_eq!(api_msgs[0].role, "assistant");
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc.len(), 1);
        assert_eq!(tc[0].function.name, "read_file");
        assert!(tc[0].function.arguments.contains("main.rs"));
    }

    #[test]
    fn tool_result_conversion() {
        let msg = Message::tool_result("call_1", "read_file", "file contents");
        let api_msgs = OpenAiCompatClient::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "read_file".into(),
            description: "Read a file".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatClient::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "read_file");
        assert_eq!(api_tools[0].r#type, "function");
    }

    // --- decoding tests ---

    #[test]
    fn decode_text_only_message() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: Some("All done.".into()),
            tool_calls: None,
            tool_call_id: None,
        };
        let output = OpenAiCompatClient::decode_message(api);
        assert_eq!(output.text, "All done.");
        assert!(output.tool_calls.is_empty());
        assert!(output.invalid_payloads.is_empty());
    }

    #[test]
    fn decode_structured_tool_call() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![ApiToolCall {
                id: "call_abc".into(),
                r#type: "function".into(),
                function: ApiFunction {
                    name: "read_file".into(),
                    arguments: r#"{"path": "src/main.rs"}"#.into(),
                },
            }]),
            tool_call_id: None,
        };
        let output = OpenAiCompatClient::decode_message(api);
        assert_eq!(output.tool_calls.len(), 1);
        assert_eq!(output.tool_calls[0].name, "read_file");
        assert_eq!(output.tool_calls[0].arguments["path"], "src/main.rs");
        assert!(output.invalid_payloads.is_empty());
    }

    #[test]
    fn decode_empty_arguments_as_empty_object() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![ApiToolCall {
                id: "call_1".into(),
                r#type: "function".into(),
                function: ApiFunction {
                    name: "get_current_time".into(),
                    arguments: "".into(),
                },
            }]),
            tool_call_id: None,
        };
        let output = OpenAiCompatClient::decode_message(api);
        assert_eq!(output.tool_calls.len(), 1);
        assert!(output.tool_calls[0].arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn decode_malformed_arguments_to_invalid_payload() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![ApiToolCall {
                id: "call_1".into(),
                r#type: "function".into(),
                function: ApiFunction {
                    name: "write_file".into(),
                    arguments: r#"{"path": "a.txt", "content":"#.into(),
                },
            }]),
            tool_call_id: None,
        };
        let output = OpenAiCompatClient::decode_message(api);
        assert!(output.tool_calls.is_empty());
        assert_eq!(output.invalid_payloads.len(), 1);
        assert!(output.invalid_payloads[0].payload.contains("write_file"));
        assert!(output.invalid_payloads[0].error.contains("failed to parse"));
    }

    #[test]
    fn decode_non_object_arguments_to_invalid_payload() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![ApiToolCall {
                id: "call_1".into(),
                r#type: "function".into(),
                function: ApiFunction {
                    name: "read_file".into(),
                    arguments: r#""just a string""#.into(),
                },
            }]),
            tool_call_id: None,
        };
        let output = OpenAiCompatClient::decode_message(api);
        assert!(output.tool_calls.is_empty());
        assert_eq!(output.invalid_payloads.len(), 1);
        assert!(output.invalid_payloads[0].error.contains("not a JSON object"));
    }

    #[test]
    fn decode_preserves_call_order() {
        let api = ApiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![
                ApiToolCall {
                    id: "call_a".into(),
                    r#type: "function".into(),
                    function: ApiFunction {
                        name: "read_file".into(),
                        arguments: "{}".into(),
                    },
                },
                ApiToolCall {
                    id: "call_b".into(),
                    r#type: "function".into(),
                    function: ApiFunction {
                        name: "write_file".into(),
                        arguments: "{}".into(),
                    },
                },
            ]),
            tool_call_id: None,
        };
        let output = OpenAiCompatClient::decode_message(api);
        assert_eq!(output.tool_calls[0].id, "call_a");
        assert_eq!(output.tool_calls[1].id, "call_b");
    }

    #[test]
    fn parse_full_api_response() {
        let data = r#"{
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Let me check.",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "read_file", "arguments": "{\"path\": \"x\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.model, "gpt-4o");
        let output = OpenAiCompatClient::decode_message(parsed.choices.into_iter().next().unwrap().message);
        assert_eq!(output.text, "Let me check.");
        assert_eq!(output.tool_calls.len(), 1);
    }
}
