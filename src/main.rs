// sql-chat: chat with a SQL database in natural language
//
// This is the main entry point: it loads settings, connects the database and
// the model, and hands control to the REPL.

use anyhow::{Context, Result};
use sql_chat::agent::prompt::system_prompt;
use sql_chat::agent::{ReactAgent, SqlToolkit};
use sql_chat::cli::Repl;
use sql_chat::config::Settings;
use sql_chat::database::DatabaseManager;
use sql_chat::llm::providers::openai::OpenAIProvider;
use sql_chat::llm::LLMProvider;
use sql_chat::logging;
use sql_chat::session::Session;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    match logging::init_file_logging() {
        Ok(path) => info!(path = %path.display(), "logging initialised"),
        Err(e) => eprintln!("Warning: logging disabled: {}", e),
    }

    let settings = Settings::from_env()?;
    info!(
        policy = %settings.policy,
        database = %settings.database_type,
        model = %settings.llm_model,
        "settings loaded"
    );

    let db = Arc::new(
        DatabaseManager::connect(&settings.database_uri)
            .await
            .context("Could not open the database")?,
    );
    println!("✅ Connected to {} database", settings.database_type);

    let provider = OpenAIProvider::new(settings.api_key.clone(), Some(settings.llm_model.clone()))?;
    provider.validate_config()?;
    let provider: Arc<dyn LLMProvider> = Arc::new(provider);
    println!(
        "✅ Initialized {}/{}",
        settings.llm_provider, settings.llm_model
    );

    let toolkit = Arc::new(SqlToolkit::new(db.clone(), provider.clone()));
    let prompt = system_prompt(settings.policy, &settings.database_type, settings.top_k);
    let agent = Arc::new(ReactAgent::new(provider, toolkit, prompt));

    let session = Session::new(settings, agent, db);
    let mut repl = Repl::new(session)?;
    if let Err(e) = repl.run().await {
        warn!(error = %e, "REPL stopped");
        return Err(e.into());
    }

    Ok(())
}
