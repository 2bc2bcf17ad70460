//! LLM Provider Trait
//!
//! This module defines the message types exchanged with chat models and the
//! trait-based abstraction over providers, including tool (function) calls.

use crate::error::{Result, SqlChatError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (sets behavior/context)
    System,
    /// User message (query or input)
    User,
    /// Assistant message (response or tool request)
    Assistant,
    /// Result of a tool call
    Tool,
}

impl MessageRole {
    /// Returns the role as a string for API requests
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call (used to match results)
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a tool call
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

    /// String argument by name, if present
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// LLM message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages, the call this is the result of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(MessageRole::Assistant, content)
        }
    }

    /// Create a tool result message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(MessageRole::Tool, content)
        }
    }

    /// Returns true if this message carries pending tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// LLM response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text content (may be empty when only tool calls are returned)
    pub content: String,
    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// Number of tokens used (input)
    pub input_tokens: Option<u32>,
    /// Number of tokens used (output)
    pub output_tokens: Option<u32>,
    /// Total tokens used
    pub total_tokens: Option<u32>,
    /// Model used for generation
    pub model: Option<String>,
    /// Finish reason (e.g., "stop", "tool_calls")
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    /// Create a new text-only response
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            model: None,
            finish_reason: None,
        }
    }

    /// Create a response that requests tool calls
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(content)
        }
    }

    /// Get total token count if available
    pub fn get_total_tokens(&self) -> Option<u32> {
        self.total_tokens.or_else(|| {
            self.input_tokens
                .and_then(|input| self.output_tokens.map(|output| input + output))
        })
    }

    /// Convert into the assistant message appended to the conversation
    pub fn into_message(self) -> Message {
        Message::assistant_with_tools(self.content, self.tool_calls)
    }
}

/// LLM generation parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0, higher = more random)
    pub temperature: Option<f32>,
}

impl GenerationParams {
    /// Create new default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for LLM providers
///
/// This trait defines the interface that chat model backends implement.
/// The agent only ever talks to models through it.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response from the LLM
    ///
    /// # Arguments
    /// * `messages` - Conversation so far, system prompt first
    /// * `tools` - Tools the model may call (empty for plain completion)
    /// * `params` - Generation parameters
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: Option<&GenerationParams>,
    ) -> Result<LLMResponse>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Check if the provider has an API key configured
    fn has_api_key(&self) -> bool;

    /// Validate the provider configuration
    fn validate_config(&self) -> Result<()> {
        if !self.has_api_key() {
            return Err(SqlChatError::LLMApiKeyMissing(
                self.provider_name().to_string(),
            ));
        }
        Ok(())
    }
}
