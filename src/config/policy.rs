//! Session policy
//!
//! Selects which flavour of the chat session is running: a plain question
//! loop, one where the user drives transactions by hand, or one where the
//! agent plans modifications before executing them.

use crate::error::SqlChatError;
use std::str::FromStr;

/// Session flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Questions only; the agent manages its own transactions
    Plain,
    /// User opens and closes transactions with `begin`/`commit`/`rollback`
    #[default]
    Transactional,
    /// Agent plans modifications and asks before executing them
    Batch,
}

impl SessionPolicy {
    /// Agent step budget used when `RECURSION_LIMIT` is not set
    pub fn default_recursion_limit(&self) -> usize {
        match self {
            SessionPolicy::Plain => 80,
            SessionPolicy::Transactional => 100,
            SessionPolicy::Batch => 50,
        }
    }

    /// Whether `begin`/`commit`/`rollback` are meta-commands
    pub fn allows_transactions(&self) -> bool {
        matches!(self, SessionPolicy::Transactional)
    }

    /// Whether `batch` is a meta-command
    pub fn allows_batch_toggle(&self) -> bool {
        matches!(self, SessionPolicy::Batch)
    }

    /// Lowercase name, as accepted by `SESSION_POLICY`
    pub fn name(&self) -> &'static str {
        match self {
            SessionPolicy::Plain => "plain",
            SessionPolicy::Transactional => "transactional",
            SessionPolicy::Batch => "batch",
        }
    }
}

impl FromStr for SessionPolicy {
    type Err = SqlChatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "basic" => Ok(SessionPolicy::Plain),
            "transactional" | "transaction" | "tx" => Ok(SessionPolicy::Transactional),
            "batch" => Ok(SessionPolicy::Batch),
            other => Err(SqlChatError::config(format!(
                "Unknown SESSION_POLICY '{}'. Expected: plain, transactional or batch",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SessionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
