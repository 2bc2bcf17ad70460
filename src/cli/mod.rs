//! CLI module
//!
//! This module provides the command-line interface for sql-chat:
//! meta-command parsing and the REPL.

pub mod commands;
pub mod repl;

// Re-exports
pub use repl::Repl;
