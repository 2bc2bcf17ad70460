//! Error types for sql-chat
//!
//! This module defines the error types used throughout the application.

use thiserror::Error;

/// Result type alias for sql-chat
pub type Result<T> = std::result::Result<T, SqlChatError>;

/// Main error type for sql-chat
#[derive(Error, Debug)]
pub enum SqlChatError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure to open the database connection
    #[error("Failed to connect to database {url}: {source}")]
    DatabaseConnection {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    /// Database URL could not be mapped to a backend
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    /// Backend recognised but not supported
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP-related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// API key missing for the configured provider
    #[error("{0} API key not found in environment variables. Please check your .env file.")]
    LLMApiKeyMissing(String),

    /// Non-success response from an LLM API
    #[error("{provider} API error (status {status}): {message}")]
    LLMApiError {
        provider: String,
        message: String,
        status: u16,
    },

    /// Header name or value rejected by the HTTP client
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Agent exceeded its step budget
    #[error("Recursion limit of {0} reached without hitting a stop condition")]
    RecursionLimit(usize),

    /// Line editor failures
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

impl SqlChatError {
    /// Wrap a connection failure together with the URL that was used
    pub fn db_connection(url: impl Into<String>, source: sqlx::Error) -> Self {
        Self::DatabaseConnection {
            url: url.into(),
            source,
        }
    }

    /// Shorthand for configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
