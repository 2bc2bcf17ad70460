//! Database module
//!
//! This module provides the database connection, statement execution and
//! the schema lookups the agent's SQL tools are built on.

pub mod connection;
pub mod format;
pub mod manager;

use crate::error::Result;
use async_trait::async_trait;

// Re-exports
pub use connection::DatabaseBackend;
pub use manager::DatabaseManager;

/// Statement execution and schema lookup.
///
/// Implemented by [`DatabaseManager`] for real connections; tests provide
/// in-memory fakes.
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    /// Execute one literal SQL statement and render any rows it returns
    async fn execute(&self, sql: &str) -> Result<String>;

    /// Names of the user tables, sorted
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// `CREATE TABLE` text plus sample rows for each named table
    async fn table_info(&self, tables: &[String]) -> Result<String>;

    /// Backend this database speaks
    fn backend(&self) -> DatabaseBackend;
}
