//! sql-chat library
//!
//! Chat with a SQL database in natural language. The main binary is in
//! src/main.rs.

pub mod agent;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod logging;
pub mod session;
