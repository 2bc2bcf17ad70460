//! Transaction state tracking
//!
//! Advisory bookkeeping for transactions the user opens with `begin` and
//! closes with `commit` or `rollback`. The statements run on the same
//! connection the agent's SQL tool uses, so everything the agent executes in
//! between belongs to the open transaction.

use crate::database::{DatabaseBackend, SqlDatabase};
use std::fmt;
use tracing::{info, warn};

/// Whether a user transaction is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    None,
    Active,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::None => write!(f, "NONE"),
            TransactionState::Active => write!(f, "ACTIVE"),
        }
    }
}

/// Transaction meta-command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    Begin,
    Commit,
    Rollback,
}

impl TransactionAction {
    /// Statement sent for this action
    pub fn statement(&self, backend: DatabaseBackend) -> &'static str {
        match (self, backend) {
            // MySQL has no BEGIN TRANSACTION
            (TransactionAction::Begin, DatabaseBackend::MySQL) => "START TRANSACTION;",
            (TransactionAction::Begin, _) => "BEGIN TRANSACTION;",
            (TransactionAction::Commit, _) => "COMMIT;",
            (TransactionAction::Rollback, _) => "ROLLBACK;",
        }
    }

    fn progressive(&self) -> &'static str {
        match self {
            TransactionAction::Begin => "starting",
            TransactionAction::Commit => "committing",
            TransactionAction::Rollback => "rolling back",
        }
    }
}

/// Result of a transaction meta-command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Statement executed and state changed
    Applied {
        action: TransactionAction,
        statement: &'static str,
    },
    /// `begin` while a transaction is open; nothing sent
    AlreadyActive,
    /// `commit` or `rollback` with nothing open; nothing sent
    NotActive(TransactionAction),
    /// Statement sent but the database rejected it
    Failed {
        action: TransactionAction,
        error: String,
    },
}

impl TransactionOutcome {
    /// Statement that ran successfully, if any
    pub fn executed_statement(&self) -> Option<&'static str> {
        match self {
            TransactionOutcome::Applied { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionOutcome::Applied { action, .. } => match action {
                TransactionAction::Begin => write!(f, "🔄 Transaction started successfully!"),
                TransactionAction::Commit => write!(f, "✅ Transaction committed successfully!"),
                TransactionAction::Rollback => {
                    write!(f, "🔄 Transaction rolled back successfully!")
                }
            },
            TransactionOutcome::AlreadyActive => {
                write!(f, "⚠️  Transaction already active. Commit or rollback first.")
            }
            TransactionOutcome::NotActive(action) => {
                let verb = match action {
                    TransactionAction::Rollback => "rollback",
                    _ => "commit",
                };
                write!(f, "⚠️  No active transaction to {}.", verb)
            }
            TransactionOutcome::Failed { action, error } => {
                write!(f, "❌ Error {} transaction: {}", action.progressive(), error)
            }
        }
    }
}

/// Tracks the user's transaction across turns
#[derive(Debug, Default)]
pub struct TransactionTracker {
    state: TransactionState,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Open a transaction unless one is already open
    pub async fn begin(&mut self, db: &dyn SqlDatabase) -> TransactionOutcome {
        if self.is_active() {
            warn!("begin ignored: transaction already active");
            return TransactionOutcome::AlreadyActive;
        }

        let action = TransactionAction::Begin;
        let statement = action.statement(db.backend());
        match db.execute(statement).await {
            Ok(_) => {
                self.state = TransactionState::Active;
                info!("transaction started");
                TransactionOutcome::Applied { action, statement }
            }
            Err(e) => {
                warn!(error = %e, "failed to start transaction");
                TransactionOutcome::Failed {
                    action,
                    error: e.to_string(),
                }
            }
        }
    }

    pub async fn commit(&mut self, db: &dyn SqlDatabase) -> TransactionOutcome {
        self.finish(TransactionAction::Commit, db).await
    }

    pub async fn rollback(&mut self, db: &dyn SqlDatabase) -> TransactionOutcome {
        self.finish(TransactionAction::Rollback, db).await
    }

    /// Close the open transaction. The state resets even when the statement fails.
    async fn finish(&mut self, action: TransactionAction, db: &dyn SqlDatabase) -> TransactionOutcome {
        if !self.is_active() {
            warn!(?action, "no active transaction");
            return TransactionOutcome::NotActive(action);
        }

        let statement = action.statement(db.backend());
        let result = db.execute(statement).await;
        self.state = TransactionState::None;

        match result {
            Ok(_) => {
                info!(?action, "transaction closed");
                TransactionOutcome::Applied { action, statement }
            }
            Err(e) => {
                warn!(?action, error = %e, "failed to close transaction");
                TransactionOutcome::Failed {
                    action,
                    error: e.to_string(),
                }
            }
        }
    }
}
