//! LLM integration module
//!
//! This module provides trait-based LLM provider abstraction
//! and the OpenAI implementation.

pub mod client;
pub mod provider;

// Provider implementations
pub mod providers {
    pub mod openai;
}

// Re-exports
pub use provider::{
    GenerationParams, LLMProvider, LLMResponse, Message, MessageRole, ToolCall, ToolDefinition,
};
