//! REPL implementation
//!
//! This module implements the interactive read-eval-print loop: it reads a
//! line with rustyline and hands it to the [`Session`] turn handler. Ctrl-C
//! while a turn is running cancels that turn only.

use crate::cli::commands::{command_summary, command_words};
use crate::error::{Result, SqlChatError};
use crate::session::{LoopControl, Session, TransactionState};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::Context;
use rustyline::Helper;
use rustyline::{CompletionType, Config, Editor};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const CANCELLED: &str = "⚠️  Operation cancelled by user.";

/// Completes meta-command words
struct MetaCommandCompleter {
    words: Vec<&'static str>,
}

impl MetaCommandCompleter {
    fn candidates(&self, line: &str) -> Vec<String> {
        let prefix = line.trim_start().to_lowercase();
        if prefix.is_empty() || prefix.contains(' ') {
            return Vec::new();
        }
        self.words
            .iter()
            .filter(|word| word.starts_with(&prefix))
            .map(|word| word.to_string())
            .collect()
    }
}

impl Completer for MetaCommandCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &Context<'_>,
    ) -> std::result::Result<(usize, Vec<String>), ReadlineError> {
        let start = line.len() - line.trim_start().len();
        Ok((start, self.candidates(line)))
    }
}

impl Hinter for MetaCommandCompleter {
    type Hint = String;
}

impl Highlighter for MetaCommandCompleter {}

impl Validator for MetaCommandCompleter {}

impl Helper for MetaCommandCompleter {}

/// Interactive chat loop
pub struct Repl {
    /// The rustyline editor
    editor: Editor<MetaCommandCompleter, DefaultHistory>,
    /// Whether the REPL should continue running
    running: bool,
    /// Conversation and transaction state
    session: Session,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL around a session
    pub fn new(session: Session) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .auto_add_history(true)
            .build();

        let mut editor = Editor::<MetaCommandCompleter, DefaultHistory>::with_config(config)?;
        editor.set_helper(Some(MetaCommandCompleter {
            words: command_words(session.policy()),
        }));

        let history_path = history_path();
        if let Err(e) = editor.load_history(&history_path) {
            // first run has no history file
            debug!(path = %history_path.display(), error = %e, "no input history loaded");
        }

        Ok(Self {
            editor,
            running: true,
            session,
            history_path,
        })
    }

    /// Run the REPL loop until `exit`, `quit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        while self.running {
            println!();
            match self.editor.readline(self.session.prompt()) {
                Ok(line) => self.dispatch(line.trim()).await,
                Err(ReadlineError::Interrupted) => {
                    println!("\n{}", CANCELLED);
                }
                Err(ReadlineError::Eof) => {
                    println!("\n👋 Goodbye!");
                    self.running = false;
                }
                Err(err) => {
                    self.save_history();
                    return Err(SqlChatError::Readline(err));
                }
            }
        }

        if self.session.transaction_state() == TransactionState::Active {
            warn!("exiting with an open transaction; it will be discarded");
        }
        self.save_history();
        info!("session ended");
        Ok(())
    }

    /// Hand one line to the session, racing it against Ctrl-C
    async fn dispatch(&mut self, line: &str) {
        let mut stdout = std::io::stdout();
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        let result = run_cancellable(&mut self.session, line, &mut stdout, interrupt).await;

        match result {
            Some(Ok(LoopControl::Continue)) => {}
            Some(Ok(LoopControl::Exit)) => self.running = false,
            Some(Err(e)) => println!("\n❌ Error: {}", e),
            None => {
                info!("turn cancelled");
                println!("\n\n{}", CANCELLED);
            }
        }
    }

    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = self.editor.save_history(&self.history_path) {
            warn!(error = %e, "could not save input history");
        }
    }

    /// Print the startup banner
    fn print_welcome(&self) {
        let rule = "=".repeat(50);
        println!("🤖 Interactive SQL Agent");
        println!("{}", rule);
        println!("Ask questions about the database.");
        println!("{}", command_summary(self.session.policy()));
        println!("{}", rule);
        for line in self.session.status_lines() {
            println!("{}", line);
        }
    }
}

/// Run one line of input unless `cancel` completes first
///
/// Returns `None` when the turn was cancelled. The dropped turn leaves the
/// question in history and appends no answer.
async fn run_cancellable<W, F>(
    session: &mut Session,
    line: &str,
    out: &mut W,
    cancel: F,
) -> Option<Result<LoopControl>>
where
    W: Write,
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        result = session.handle_input(line, out) => Some(result),
        _ = cancel => None,
    }
}

/// Input history file, next to the log file
fn history_path() -> PathBuf {
    crate::logging::log_path().with_file_name("history")
}
