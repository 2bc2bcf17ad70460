//! OpenAI API Provider
//!
//! This module implements the LLMProvider trait for OpenAI's chat completions
//! API, including function calling.

use crate::error::{Result, SqlChatError};
use crate::llm::client::LLMHttpClient;
use crate::llm::provider::{
    GenerationParams, LLMProvider, LLMResponse, Message, ToolCall, ToolDefinition,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// OpenAI API base URL
const OPENAI_API_BASE: &str = "https://api.openai.com/v1/chat/completions";

/// Default model
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI GPT API provider
pub struct OpenAIProvider {
    /// API key for authentication
    api_key: String,
    /// Model to use (e.g., "gpt-4o", "gpt-4o-mini")
    model: String,
    /// HTTP client for making requests
    client: LLMHttpClient,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model identifier (defaults to gpt-4o-mini)
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: LLMHttpClient::new()?,
        })
    }

    /// Convert our Message format to OpenAI format
    fn convert_messages(messages: &[Message]) -> Vec<OpenAIMessage> {
        messages
            .iter()
            .map(|msg| {
                let tool_calls: Vec<OpenAIToolCall> = msg
                    .tool_calls
                    .iter()
                    .map(|call| OpenAIToolCall {
                        id: call.id.clone(),
                        kind: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: call.name.clone(),
                            arguments: match &call.arguments {
                                serde_json::Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            },
                        },
                    })
                    .collect();

                // Assistant turns that only call tools carry null content
                let content = if msg.content.is_empty() && !tool_calls.is_empty() {
                    None
                } else {
                    Some(msg.content.clone())
                };

                OpenAIMessage {
                    role: msg.role.as_str().to_string(),
                    content,
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: msg.tool_call_id.clone(),
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAITool> {
        tools
            .iter()
            .map(|tool| OpenAITool {
                kind: "function".to_string(),
                function: OpenAIFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect()
    }

    /// Turn the first choice of a response into our response type
    fn convert_response(response: OpenAIResponse) -> Result<LLMResponse> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            SqlChatError::LLMApiError {
                provider: "OpenAI".to_string(),
                message: "Response contained no choices".to_string(),
                status: 0,
            }
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let arguments = parse_arguments(&call.function.name, call.function.arguments);
                ToolCall::new(call.id, call.function.name, arguments)
            })
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            input_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
            total_tokens: response.usage.as_ref().map(|u| u.total_tokens),
            model: Some(response.model),
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: Option<&GenerationParams>,
    ) -> Result<LLMResponse> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: Self::convert_messages(messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(Self::convert_tools(tools))
            },
            max_tokens: params.and_then(|p| p.max_tokens),
            temperature: params.and_then(|p| p.temperature),
        };

        let headers = LLMHttpClient::build_headers(&self.api_key)?;
        let response_text = self
            .client
            .post_with_retry(self.provider_name(), OPENAI_API_BASE, headers, &request)
            .await?;

        let openai_response: OpenAIResponse =
            serde_json::from_str(&response_text).map_err(|e| SqlChatError::LLMApiError {
                provider: "OpenAI".to_string(),
                message: format!("Failed to parse response: {}", e),
                status: 0,
            })?;

        let response = Self::convert_response(openai_response)?;
        debug!(
            tool_calls = response.tool_calls.len(),
            total_tokens = ?response.get_total_tokens(),
            "OpenAI response received"
        );
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }

    fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// OpenAI API request format
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// OpenAI API message format (request and response)
#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded arguments object
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    kind: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

/// Choice in OpenAI response
#[derive(Debug, Deserialize)]
struct Choice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

/// Decode a tool call's argument string
///
/// Models occasionally send an empty string for no arguments. Text that is
/// not valid JSON is kept as a string so the tool can report it.
fn parse_arguments(tool: &str, raw: String) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::Value::Object(Default::default());
    }
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(tool = %tool, error = %e, "tool call arguments are not valid JSON");
            serde_json::Value::String(raw)
        }
    }
}

/// Token usage information
#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
