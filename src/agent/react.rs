//! ReAct agent executor
//!
//! Alternates model calls and tool execution until the model answers without
//! requesting tools, yielding one [`Step`] per state change.

use crate::agent::{AgentExecutor, Step, StepStream, SqlToolkit};
use crate::error::{Result, SqlChatError};
use crate::llm::{GenerationParams, LLMProvider, Message, MessageRole, ToolCall, ToolDefinition};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Tool-calling agent over the SQL toolkit
pub struct ReactAgent {
    provider: Arc<dyn LLMProvider>,
    toolkit: Arc<SqlToolkit>,
    system_prompt: String,
    params: GenerationParams,
}

impl ReactAgent {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        toolkit: Arc<SqlToolkit>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            toolkit,
            system_prompt: system_prompt.into(),
            params: GenerationParams::new().with_temperature(0.0),
        }
    }
}

impl AgentExecutor for ReactAgent {
    fn stream(&self, history: Vec<Message>, recursion_limit: usize) -> Box<dyn StepStream> {
        info!(
            messages = history.len(),
            recursion_limit, "starting agent run"
        );
        Box::new(ReactRun {
            provider: Arc::clone(&self.provider),
            toolkit: Arc::clone(&self.toolkit),
            tools: self.toolkit.definitions(),
            system: Message::system(self.system_prompt.clone()),
            params: self.params.clone(),
            messages: history,
            steps: 0,
            limit: recursion_limit,
            started: false,
            done: false,
        })
    }
}

/// State of one agent run
struct ReactRun {
    provider: Arc<dyn LLMProvider>,
    toolkit: Arc<SqlToolkit>,
    tools: Vec<ToolDefinition>,
    system: Message,
    params: GenerationParams,
    messages: Vec<Message>,
    steps: usize,
    limit: usize,
    started: bool,
    done: bool,
}

impl ReactRun {
    /// Tool calls of the newest assistant message that have not run yet
    fn pending_calls(&self) -> Option<Vec<ToolCall>> {
        self.messages
            .last()
            .filter(|m| m.role == MessageRole::Assistant && m.has_tool_calls())
            .map(|m| m.tool_calls.clone())
    }

    async fn call_model(&mut self) -> Result<Message> {
        let mut request = Vec::with_capacity(self.messages.len() + 1);
        request.push(self.system.clone());
        request.extend(self.messages.iter().cloned());

        let response = self
            .provider
            .generate(&request, &self.tools, Some(&self.params))
            .await?;
        let message = response.into_message();
        if !message.has_tool_calls() {
            self.done = true;
        }
        self.messages.push(message.clone());
        Ok(message)
    }

    async fn run_tools(&mut self, calls: Vec<ToolCall>) -> Option<Message> {
        let mut last = None;
        for call in &calls {
            let output = self.toolkit.invoke(call).await;
            let message = Message::tool(call.id.clone(), output);
            self.messages.push(message.clone());
            last = Some(message);
        }
        last
    }
}

#[async_trait]
impl StepStream for ReactRun {
    async fn next_step(&mut self) -> Result<Option<Step>> {
        if self.done {
            return Ok(None);
        }

        if !self.started {
            self.started = true;
            if let Some(input) = self.messages.last() {
                return Ok(Some(Step::new(input.clone())));
            }
        }

        if self.steps >= self.limit {
            self.done = true;
            return Err(SqlChatError::RecursionLimit(self.limit));
        }
        self.steps += 1;

        let message = match self.pending_calls() {
            Some(calls) => {
                debug!(step = self.steps, calls = calls.len(), "running tools");
                match self.run_tools(calls).await {
                    Some(message) => message,
                    None => return Ok(None),
                }
            }
            None => {
                debug!(step = self.steps, "calling model");
                match self.call_model().await {
                    Ok(message) => message,
                    Err(e) => {
                        self.done = true;
                        return Err(e);
                    }
                }
            }
        };

        Ok(Some(Step::new(message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DatabaseBackend, SqlDatabase};
    use crate::llm::LLMResponse;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct CountingDatabase;

    #[async_trait]
    impl SqlDatabase for CountingDatabase {
        async fn execute(&self, _sql: &str) -> Result<String> {
            Ok("[(275,)]".to_string())
        }

        async fn list_tables(&self) -> Result<Vec<String>> {
            Ok(vec!["Artist".to_string()])
        }

        async fn table_info(&self, _tables: &[String]) -> Result<String> {
            Ok(String::new())
        }

        fn backend(&self) -> DatabaseBackend {
            DatabaseBackend::SQLite
        }
    }

    /// Replays canned responses and records what it was sent
    struct ScriptedModel {
        responses: Mutex<VecDeque<LLMResponse>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<LLMResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedModel {
        async fn generate(
            &self,
            messages: &[Message],
            _tools: &[ToolDefinition],
            _params: Option<&GenerationParams>,
        ) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SqlChatError::LLMApiError {
                    provider: "Scripted".to_string(),
                    message: "script exhausted".to_string(),
                    status: 500,
                })
        }

        fn provider_name(&self) -> &str {
            "Scripted"
        }

        fn has_api_key(&self) -> bool {
            true
        }
    }

    fn agent(model: Arc<ScriptedModel>) -> ReactAgent {
        let toolkit = SqlToolkit::new(Arc::new(CountingDatabase), model.clone());
        ReactAgent::new(model, Arc::new(toolkit), "You are a SQL agent.")
    }

    fn count_script() -> Vec<LLMResponse> {
        vec![
            LLMResponse::with_tool_calls(
                "",
                vec![ToolCall::new(
                    "call_1",
                    "sql_db_query",
                    json!({"query": "SELECT COUNT(*) FROM Artist"}),
                )],
            ),
            LLMResponse::new("There are 275 artists."),
        ]
    }

    #[tokio::test]
    async fn test_stream_yields_each_state_change() {
        let model = Arc::new(ScriptedModel::new(count_script()));
        let agent = agent(model.clone());
        let mut stream = agent.stream(vec![Message::user("How many artists?")], 10);

        let input = stream.next_step().await.unwrap().unwrap();
        assert_eq!(input.message, Message::user("How many artists?"));

        let request = stream.next_step().await.unwrap().unwrap();
        assert_eq!(request.message.tool_calls[0].name, "sql_db_query");

        let tool = stream.next_step().await.unwrap().unwrap();
        assert_eq!(tool.message.role, MessageRole::Tool);
        assert_eq!(tool.message.content, "[(275,)]");
        assert_eq!(tool.message.tool_call_id.as_deref(), Some("call_1"));

        let answer = stream.next_step().await.unwrap().unwrap();
        assert_eq!(answer.message.content, "There are 275 artists.");
        assert!(stream.next_step().await.unwrap().is_none());
        assert!(stream.next_step().await.unwrap().is_none());

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0][0].role, MessageRole::System);
        assert_eq!(requests[1].len(), 4);
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let model = Arc::new(ScriptedModel::new(count_script()));
        let agent = agent(model);
        let mut stream = agent.stream(vec![Message::user("How many artists?")], 1);

        assert!(stream.next_step().await.unwrap().is_some());
        assert!(stream.next_step().await.unwrap().is_some());
        let err = stream.next_step().await.unwrap_err();
        assert!(matches!(err, SqlChatError::RecursionLimit(1)));
        assert!(stream.next_step().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_model_error_ends_stream() {
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let agent = agent(model);
        let mut stream = agent.stream(vec![Message::user("hi")], 10);

        assert!(stream.next_step().await.unwrap().is_some());
        assert!(stream.next_step().await.is_err());
        assert!(stream.next_step().await.unwrap().is_none());
    }
}
