//! Agent module
//!
//! The agent answers a question by alternating between model calls and SQL
//! tool calls. Callers see its progress as a lazy stream of [`Step`]s, one per
//! state change, so the chat loop can print tool activity as it happens and
//! can be tested against a scripted stream.

pub mod prompt;
pub mod react;
pub mod tools;

use crate::error::Result;
use crate::llm::Message;
use async_trait::async_trait;

// Re-exports
pub use react::ReactAgent;
pub use tools::SqlToolkit;

/// Snapshot of agent progress: the newest message in the agent's state
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub message: Message,
}

impl Step {
    pub fn new(message: Message) -> Self {
        Self { message }
    }
}

/// A finite, non-restartable sequence of steps for one turn
#[async_trait]
pub trait StepStream: Send {
    /// Next snapshot, or `None` once the agent has produced its answer
    async fn next_step(&mut self) -> Result<Option<Step>>;
}

/// Something that can run a conversation to an answer
pub trait AgentExecutor: Send + Sync {
    /// Start a run over a copy of the conversation history.
    ///
    /// `recursion_limit` bounds the number of model and tool steps.
    fn stream(&self, history: Vec<Message>, recursion_limit: usize) -> Box<dyn StepStream>;
}
