//! Meta-commands
//!
//! Reserved words intercepted before the agent sees the input. Matching is
//! case-insensitive against the whole trimmed line; a word the current
//! session policy does not enable is treated as an ordinary question.

use crate::config::SessionPolicy;

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandType {
    /// Leave the program
    Exit,
    /// Forget the conversation
    Clear,
    /// Toggle SQL visibility
    Debug,
    /// Toggle batch planning
    Batch,
    /// Open a transaction
    Begin,
    /// Commit the open transaction
    Commit,
    /// Roll back the open transaction
    Rollback,
    /// Show current configuration
    Config,
    /// Show help message
    Help,
    /// Blank input
    Empty,
    /// Natural language question for the agent
    Question { text: String },
}

/// Parsed command
#[derive(Debug, Clone)]
pub struct Command {
    /// The type of command
    pub command_type: CommandType,
}

impl Command {
    /// Parse a command from user input
    pub fn parse(input: &str, policy: SessionPolicy) -> Self {
        let input = input.trim();

        let command_type = match input.to_lowercase().as_str() {
            "" => CommandType::Empty,
            "exit" | "quit" => CommandType::Exit,
            "clear" => CommandType::Clear,
            "debug" => CommandType::Debug,
            "config" => CommandType::Config,
            "help" => CommandType::Help,
            "batch" if policy.allows_batch_toggle() => CommandType::Batch,
            "begin" if policy.allows_transactions() => CommandType::Begin,
            "commit" if policy.allows_transactions() => CommandType::Commit,
            "rollback" if policy.allows_transactions() => CommandType::Rollback,
            _ => CommandType::Question {
                text: input.to_string(),
            },
        };

        Command { command_type }
    }

    /// Whether this command goes to the agent
    pub fn is_question(&self) -> bool {
        matches!(self.command_type, CommandType::Question { .. })
    }
}

/// Meta-command words available under a policy, for completion
pub fn command_words(policy: SessionPolicy) -> Vec<&'static str> {
    let mut words = vec!["exit", "quit", "clear", "debug", "config", "help"];
    if policy.allows_batch_toggle() {
        words.push("batch");
    }
    if policy.allows_transactions() {
        words.extend(["begin", "commit", "rollback"]);
    }
    words
}

/// Short command list shown at startup
pub fn command_summary(policy: SessionPolicy) -> String {
    let mut lines = vec![
        "Special commands:",
        "  - 'exit' or 'quit': Exit the program",
        "  - 'clear': Clear conversation history",
        "  - 'debug': Toggle debug mode (show SQL queries)",
    ];
    if policy.allows_batch_toggle() {
        lines.push("  - 'batch': Toggle batch execution mode");
    }
    if policy.allows_transactions() {
        lines.push("  - 'begin': Start a new transaction");
        lines.push("  - 'commit': Commit current transaction");
        lines.push("  - 'rollback': Rollback current transaction");
    }
    lines.push("  - 'config': Show current configuration");
    lines.push("  - 'help': Show this help");
    lines.join("\n")
}

/// Text printed for the `help` command
pub fn help_text(policy: SessionPolicy) -> String {
    let mut lines = vec![
        "📖 Help:",
        "  - You can ask questions about the Chinook database",
        "  - Examples: 'How many artists are there?', 'Show AC/DC albums'",
        "  - The agent can create, modify and query data",
        "  - Use 'debug' to toggle SQL query visibility",
    ];
    match policy {
        SessionPolicy::Plain => {}
        SessionPolicy::Transactional => {
            lines.push("  - Use 'begin' to start a transaction");
            lines.push("  - Use 'commit' to save changes");
            lines.push("  - Use 'rollback' to cancel changes");
        }
        SessionPolicy::Batch => {
            lines.push("  - Use 'batch' to toggle batch execution mode");
            lines.push("  - In batch mode, modifications are planned first, then executed");
        }
    }
    lines.push("  - Use 'config' to show the current configuration");
    lines.join("\n")
}
