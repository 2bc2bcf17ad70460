//! Chat session
//!
//! A [`Session`] owns everything that changes while the program runs: the
//! conversation history, the debug and batch flags and the transaction
//! tracker. [`Session::handle_input`] is the turn handler: it runs one
//! meta-command or one agent turn and writes everything the user sees to the
//! given writer.

pub mod history;
pub mod transaction;

use crate::agent::tools::{QUERY_CHECKER_TOOL, QUERY_TOOL};
use crate::agent::AgentExecutor;
use crate::classifier::{is_modification_query, requires_modification};
use crate::cli::commands::{help_text, Command, CommandType};
use crate::config::{SessionPolicy, Settings};
use crate::database::SqlDatabase;
use crate::error::Result;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, error, info};

// Re-exports
pub use history::ConversationHistory;
pub use transaction::{TransactionOutcome, TransactionState, TransactionTracker};

const SEPARATOR_WIDTH: usize = 40;

/// Whether the read loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Toggles that only affect what gets printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFlags {
    pub debug: bool,
    pub batch: bool,
}

/// What one agent turn produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReport {
    /// Last non-empty content seen on the stream
    pub answer: String,
    /// Steps that carried tool calls
    pub step_count: usize,
    /// `sql_db_query` statements seen while debug was on
    pub executed_queries: Vec<String>,
}

impl TurnReport {
    pub fn modification_queries(&self) -> Vec<&str> {
        self.executed_queries
            .iter()
            .map(String::as_str)
            .filter(|q| is_modification_query(q))
            .collect()
    }
}

/// State of one interactive session
pub struct Session {
    settings: Settings,
    agent: Arc<dyn AgentExecutor>,
    db: Arc<dyn SqlDatabase>,
    flags: SessionFlags,
    tracker: TransactionTracker,
    history: ConversationHistory,
}

impl Session {
    pub fn new(settings: Settings, agent: Arc<dyn AgentExecutor>, db: Arc<dyn SqlDatabase>) -> Self {
        let flags = SessionFlags {
            debug: settings.debug_mode,
            batch: settings.batch_mode,
        };
        Self {
            settings,
            agent,
            db,
            flags,
            tracker: TransactionTracker::new(),
            history: ConversationHistory::new(),
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.settings.policy
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.tracker.state()
    }

    /// Input prompt, marked while a transaction is open
    pub fn prompt(&self) -> &'static str {
        if self.tracker.is_active() {
            "💬 You🔄: "
        } else {
            "💬 You: "
        }
    }

    /// Status lines printed under the startup banner
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("🔍 Debug mode: {}", on_off(self.flags.debug))];
        if self.policy().allows_batch_toggle() {
            lines.push(format!("📦 Batch mode: {}", on_off(self.flags.batch)));
        }
        if self.policy().allows_transactions() {
            lines.push(format!("🔄 Transaction: {}", self.tracker.state()));
        }
        lines.push(format!("🎯 Database: {}", self.settings.database_type));
        lines.push(format!(
            "🧠 LLM: {}/{}",
            self.settings.llm_provider, self.settings.llm_model
        ));
        lines
    }

    /// Handle one line of user input
    pub async fn handle_input<W: Write>(&mut self, input: &str, out: &mut W) -> Result<LoopControl> {
        let command = Command::parse(input, self.policy());
        debug!(command = ?command.command_type, "dispatching input");

        match command.command_type {
            CommandType::Exit => {
                writeln!(out, "\n👋 Goodbye!")?;
                return Ok(LoopControl::Exit);
            }
            CommandType::Clear => {
                self.history.clear();
                writeln!(out, "\n🧹 History cleared.")?;
            }
            CommandType::Debug => {
                self.flags.debug = !self.flags.debug;
                writeln!(out, "\n🔍 Debug mode: {}", on_off(self.flags.debug))?;
            }
            CommandType::Batch => {
                self.flags.batch = !self.flags.batch;
                writeln!(out, "\n📦 Batch mode: {}", on_off(self.flags.batch))?;
            }
            CommandType::Begin => {
                let outcome = self.tracker.begin(self.db.as_ref()).await;
                self.print_transaction_outcome(&outcome, out)?;
            }
            CommandType::Commit => {
                let outcome = self.tracker.commit(self.db.as_ref()).await;
                self.print_transaction_outcome(&outcome, out)?;
            }
            CommandType::Rollback => {
                let outcome = self.tracker.rollback(self.db.as_ref()).await;
                self.print_transaction_outcome(&outcome, out)?;
            }
            CommandType::Config => {
                writeln!(out, "\n⚙️  Current Configuration:")?;
                writeln!(
                    out,
                    "{}",
                    self.settings.render_table(self.flags.debug, self.flags.batch)
                )?;
            }
            CommandType::Help => {
                writeln!(out, "\n{}", help_text(self.policy()))?;
            }
            CommandType::Empty => {
                writeln!(out, "⚠️  Please write a question.")?;
            }
            CommandType::Question { text } => {
                self.ask(text, out).await?;
            }
        }

        Ok(LoopControl::Continue)
    }

    fn print_transaction_outcome<W: Write>(
        &self,
        outcome: &TransactionOutcome,
        out: &mut W,
    ) -> Result<()> {
        writeln!(out, "\n{}", outcome)?;
        if self.flags.debug {
            if let Some(statement) = outcome.executed_statement() {
                writeln!(out, "   📝 SQL Query: {}", statement)?;
            }
        }
        Ok(())
    }

    /// Run one agent turn. Agent failures are reported and leave the user
    /// message in history without an answer.
    async fn ask<W: Write>(&mut self, text: String, out: &mut W) -> Result<()> {
        self.history.push_user(text);
        info!(history = self.history.len(), "question received");

        let in_transaction = self.tracker.is_active();
        writeln!(
            out,
            "\n🤖 SQL Agent{}: Processing your query...",
            if in_transaction { "🔄 [TRANSACTION]" } else { "" }
        )?;
        if in_transaction {
            writeln!(
                out,
                "⚠️  WARNING: You are in a transaction. Changes will not be permanent until you 'commit'."
            )?;
        }
        if self.batch_planning() {
            writeln!(
                out,
                "📦 Batch mode: Modifications will be planned and executed together"
            )?;
        }
        writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))?;

        let report = match self.run_turn(out).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "agent turn failed");
                writeln!(out, "\n❌ Error: {}", e)?;
                writeln!(out, "Try with another question.")?;
                return Ok(());
            }
        };

        writeln!(out, "{}", "-".repeat(SEPARATOR_WIDTH))?;
        writeln!(out, "✅ Response:")?;
        writeln!(out, "{}", report.answer)?;

        let modifications = report.modification_queries();
        if !modifications.is_empty() {
            writeln!(
                out,
                "\n📊 Summary: {} modification(s) executed",
                modifications.len()
            )?;
            if self.flags.debug {
                for (i, query) in modifications.iter().enumerate() {
                    writeln!(out, "   {}. {}", i + 1, query)?;
                }
            }
        }

        info!(steps = report.step_count, "turn finished");
        if !report.answer.is_empty() {
            self.history.push_assistant(report.answer);
        }
        Ok(())
    }

    fn batch_planning(&self) -> bool {
        self.policy() == SessionPolicy::Batch && self.flags.batch
    }

    /// Drive the agent stream to completion, printing tool activity
    async fn run_turn<W: Write>(&self, out: &mut W) -> Result<TurnReport> {
        let might_modify = self
            .history
            .last_user_text()
            .map(requires_modification)
            .unwrap_or(false);
        debug!(might_modify, "classified question");
        if might_modify && self.batch_planning() {
            writeln!(out, "🔍 Detected potential modification request")?;
            writeln!(out, "📋 Agent will plan operations before executing")?;
        }

        let mut report = TurnReport::default();
        let mut stream = self
            .agent
            .stream(self.history.snapshot(), self.settings.recursion_limit);

        while let Some(step) = stream.next_step().await? {
            let message = step.message;

            if let Some(call) = message.tool_calls.first() {
                report.step_count += 1;
                writeln!(out, "🔧 Step {}: Executing {}", report.step_count, call.name)?;

                if self.flags.debug {
                    let query = call.str_arg("query").filter(|q| !q.is_empty());
                    match (call.name.as_str(), query) {
                        (QUERY_TOOL, Some(query)) => {
                            writeln!(out, "   📝 SQL Query: {}", query)?;
                            report.executed_queries.push(query.to_string());
                        }
                        (QUERY_CHECKER_TOOL, Some(query)) => {
                            writeln!(out, "   🔍 Checking Query: {}", query)?;
                        }
                        _ => {}
                    }
                }
            }

            if !message.content.is_empty() && message.content != report.answer {
                report.answer = message.content;
            }
        }

        Ok(report)
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}
