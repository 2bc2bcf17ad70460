//! Integration tests for sql-chat
//!
//! Drives a whole session against an in-memory SQLite database with a
//! scripted model standing in for the LLM.

use async_trait::async_trait;
use serde_json::json;
use sql_chat::agent::prompt::system_prompt;
use sql_chat::agent::{ReactAgent, SqlToolkit};
use sql_chat::config::{SessionPolicy, Settings};
use sql_chat::database::{DatabaseManager, SqlDatabase};
use sql_chat::error::{Result, SqlChatError};
use sql_chat::llm::{
    GenerationParams, LLMProvider, LLMResponse, Message, MessageRole, ToolCall, ToolDefinition,
};
use sql_chat::session::{LoopControl, Session, TransactionState};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

/// Model that replays canned responses in order
struct ScriptedModel {
    responses: Mutex<VecDeque<LLMResponse>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    fn new(responses: Vec<LLMResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
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
                message: "no more responses".to_string(),
                status: 503,
            })
    }

    fn provider_name(&self) -> &str {
        "Scripted"
    }

    fn has_api_key(&self) -> bool {
        true
    }
}

fn call(id: &str, tool: &str, args: serde_json::Value) -> LLMResponse {
    LLMResponse::with_tool_calls("", vec![ToolCall::new(id, tool, args)])
}

async fn chinook_sample() -> Arc<DatabaseManager> {
    let db = DatabaseManager::connect("sqlite::memory:").await.unwrap();
    db.execute("CREATE TABLE Artist (ArtistId INTEGER PRIMARY KEY, Name NVARCHAR(120))")
        .await
        .unwrap();
    db.execute("INSERT INTO Artist (Name) VALUES ('AC/DC'), ('Accept'), ('Aerosmith')")
        .await
        .unwrap();
    Arc::new(db)
}

fn session(
    policy: SessionPolicy,
    db: Arc<DatabaseManager>,
    model: Arc<ScriptedModel>,
) -> Session {
    let settings = Settings::from_lookup(|key| match key {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "SESSION_POLICY" => Some(policy.name().to_string()),
        _ => None,
    })
    .unwrap();

    let toolkit = Arc::new(SqlToolkit::new(db.clone(), model.clone()));
    let prompt = system_prompt(settings.policy, &settings.database_type, settings.top_k);
    let agent = Arc::new(ReactAgent::new(model, toolkit, prompt));
    Session::new(settings, agent, db)
}

async fn say(session: &mut Session, input: &str) -> String {
    let mut out = Vec::new();
    let control = session.handle_input(input, &mut out).await.unwrap();
    assert_eq!(control, LoopControl::Continue);
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn test_question_answered_from_database() {
    let db = chinook_sample().await;
    let model = ScriptedModel::new(vec![
        call("call_1", "sql_db_list_tables", json!({})),
        call(
            "call_2",
            "sql_db_query",
            json!({"query": "SELECT COUNT(*) FROM Artist"}),
        ),
        LLMResponse::new("There are 3 artists."),
    ]);
    let mut session = session(SessionPolicy::Plain, db, model.clone());

    let output = say(&mut session, "How many artists are there?").await;
    assert!(output.contains("🔧 Step 1: Executing sql_db_list_tables"));
    assert!(output.contains("🔧 Step 2: Executing sql_db_query"));
    assert!(output.contains("✅ Response:\nThere are 3 artists."));
    assert_eq!(session.history().len(), 2);

    let requests = model.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0][0].role, MessageRole::System);
    let last = requests[2].last().unwrap();
    assert_eq!(last.role, MessageRole::Tool);
    assert_eq!(last.content, "[(3,)]");
    assert!(requests[1].iter().any(|m| m.content == "Artist"));
}

#[tokio::test]
async fn test_sql_errors_go_back_to_the_model() {
    let db = chinook_sample().await;
    let model = ScriptedModel::new(vec![
        call("call_1", "sql_db_query", json!({"query": "SELECT Nme FROM Artist"})),
        LLMResponse::new("I could not find that column."),
    ]);
    let mut session = session(SessionPolicy::Plain, db, model.clone());

    let output = say(&mut session, "List artist names").await;
    assert!(output.contains("I could not find that column."));

    let requests = model.requests.lock().unwrap();
    let tool_result = requests[1].last().unwrap();
    assert!(tool_result.content.starts_with("Error: "));
}

#[tokio::test]
async fn test_rollback_discards_agent_changes() {
    let db = chinook_sample().await;
    let model = ScriptedModel::new(vec![
        call(
            "call_1",
            "sql_db_query",
            json!({"query": "INSERT INTO Artist (Name) VALUES ('Black Sabbath')"}),
        ),
        LLMResponse::new("Added Black Sabbath."),
    ]);
    let mut session = session(SessionPolicy::Transactional, db.clone(), model);

    say(&mut session, "debug").await;
    let output = say(&mut session, "begin").await;
    assert!(output.contains("📝 SQL Query: BEGIN TRANSACTION;"));
    assert_eq!(session.transaction_state(), TransactionState::Active);

    let output = say(&mut session, "Add the artist Black Sabbath").await;
    assert!(output.contains("📊 Summary: 1 modification(s) executed"));
    assert_eq!(
        assert_ok!(db.execute("SELECT COUNT(*) FROM Artist").await),
        "[(4,)]"
    );

    say(&mut session, "rollback").await;
    assert_eq!(session.transaction_state(), TransactionState::None);
    assert_eq!(
        assert_ok!(db.execute("SELECT COUNT(*) FROM Artist").await),
        "[(3,)]"
    );

    // nothing open any more
    assert_err!(db.execute("COMMIT;").await);
}

#[tokio::test]
async fn test_model_failure_keeps_session_alive() {
    let db = chinook_sample().await;
    let model = ScriptedModel::new(Vec::new());
    let mut session = session(SessionPolicy::Batch, db, model);

    let output = say(&mut session, "How many artists are there?").await;
    assert!(output.contains("❌ Error: "));
    assert!(output.contains("no more responses"));
    assert_eq!(session.history().len(), 1);

    let output = say(&mut session, "config").await;
    assert!(output.contains("Current Configuration"));
    assert!(output.contains("batch"));
}

#[tokio::test]
async fn test_malformed_tool_arguments_do_not_end_the_turn() {
    let db = chinook_sample().await;
    let model = ScriptedModel::new(vec![
        call("call_1", "sql_db_query", json!("{\"query\": \"SELECT COUNT(*) FROM")),
        call(
            "call_2",
            "sql_db_query",
            json!({"query": "SELECT COUNT(*) FROM Artist"}),
        ),
        LLMResponse::new("There are 3 artists."),
    ]);
    let mut session = session(SessionPolicy::Plain, db, model.clone());

    let output = say(&mut session, "How many artists are there?").await;
    assert!(!output.contains("❌ Error: "));
    assert!(output.contains("✅ Response:\nThere are 3 artists."));
    assert_eq!(session.history().len(), 2);

    let requests = model.requests.lock().unwrap();
    let tool_result = requests[1].last().unwrap();
    assert_eq!(tool_result.role, MessageRole::Tool);
    assert!(tool_result
        .content
        .starts_with("Error: invalid arguments for sql_db_query: "));
}
