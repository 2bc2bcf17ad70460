//! Database connection abstraction
//!
//! This module maps connection URLs onto the supported backends and opens the
//! single connection the chat session runs on. One connection, not a pool:
//! a `BEGIN TRANSACTION;` issued by the user has to land on the same session
//! as the statements the agent runs afterwards.

use crate::database::format::CellValue;
use crate::error::{Result, SqlChatError};
use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Column, ColumnIndex, Connection, Decode, Executor, Row, Type, ValueRef};
use tracing::info;

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// PostgreSQL
    PostgreSQL,
    /// MySQL/MariaDB
    MySQL,
    /// SQLite
    SQLite,
}

impl DatabaseBackend {
    /// Parse database URL to determine backend
    pub fn from_url(url: &str) -> Result<Self> {
        let url_lower = url.to_lowercase();

        if url_lower.starts_with("postgres://") || url_lower.starts_with("postgresql://") {
            Ok(DatabaseBackend::PostgreSQL)
        } else if url_lower.starts_with("mysql://") || url_lower.starts_with("mariadb://") {
            Ok(DatabaseBackend::MySQL)
        } else if url_lower.starts_with("sqlite:")
            || url_lower.ends_with(".db")
            || url_lower.ends_with(".sqlite")
            || url_lower.ends_with(".sqlite3")
        {
            Ok(DatabaseBackend::SQLite)
        } else if url_lower.starts_with("mssql://") || url_lower.starts_with("sqlserver://") {
            Err(SqlChatError::UnsupportedDatabaseType(
                "Microsoft SQL Server".to_string(),
            ))
        } else {
            Err(SqlChatError::InvalidDatabaseUrl(format!(
                "Unable to determine database type from URL: {}",
                url
            )))
        }
    }

    /// Get the name of this database backend
    pub fn name(&self) -> &'static str {
        match self {
            DatabaseBackend::PostgreSQL => "PostgreSQL",
            DatabaseBackend::MySQL => "MySQL",
            DatabaseBackend::SQLite => "SQLite",
        }
    }

    /// Quote an identifier for this dialect
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            DatabaseBackend::MySQL => format!("`{}`", ident.replace('`', "``")),
            DatabaseBackend::PostgreSQL | DatabaseBackend::SQLite => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rewrite a URL into the form the sqlx drivers accept.
///
/// SQLAlchemy-style `sqlite:///Chinook.db` means a path relative to the
/// working directory; sqlx reads `sqlite:Chinook.db` that way. Bare file
/// paths get the `sqlite:` scheme prepended. `mariadb://` is served by the
/// MySQL driver.
pub fn normalize_url(url: &str, backend: DatabaseBackend) -> String {
    match backend {
        DatabaseBackend::SQLite => {
            let path = if let Some(stripped) = url.strip_prefix("sqlite:///") {
                stripped
            } else if let Some(stripped) = url.strip_prefix("sqlite://") {
                stripped
            } else if let Some(stripped) = url.strip_prefix("sqlite:") {
                stripped
            } else {
                url
            };
            format!("sqlite:{}", path)
        }
        DatabaseBackend::MySQL => match url.strip_prefix("mariadb://") {
            Some(rest) => format!("mysql://{}", rest),
            None => url.to_string(),
        },
        DatabaseBackend::PostgreSQL => url.to_string(),
    }
}

/// The session's database connection
///
/// One variant per backend, each holding the concrete sqlx connection.
pub enum DatabaseConnection {
    /// SQLite connection
    Sqlite(SqliteConnection),
    /// PostgreSQL connection
    Postgres(PgConnection),
    /// MySQL connection
    MySql(MySqlConnection),
}

impl DatabaseConnection {
    /// Open a connection for the given URL
    pub async fn connect(url: &str) -> Result<Self> {
        let backend = DatabaseBackend::from_url(url)?;
        let driver_url = normalize_url(url, backend);

        let mut conn = match backend {
            DatabaseBackend::SQLite => SqliteConnection::connect(&driver_url)
                .await
                .map(DatabaseConnection::Sqlite),
            DatabaseBackend::PostgreSQL => PgConnection::connect(&driver_url)
                .await
                .map(DatabaseConnection::Postgres),
            DatabaseBackend::MySQL => MySqlConnection::connect(&driver_url)
                .await
                .map(DatabaseConnection::MySql),
        }
        .map_err(|e| SqlChatError::db_connection(url, e))?;

        // Test the connection
        conn.fetch("SELECT 1")
            .await
            .map_err(|e| match e {
                SqlChatError::Database(source) => SqlChatError::db_connection(url, source),
                other => other,
            })?;

        info!(backend = %backend, url = %url, "database connection established");
        Ok(conn)
    }

    /// Get the database backend for this connection
    pub fn backend(&self) -> DatabaseBackend {
        match self {
            DatabaseConnection::Sqlite(_) => DatabaseBackend::SQLite,
            DatabaseConnection::Postgres(_) => DatabaseBackend::PostgreSQL,
            DatabaseConnection::MySql(_) => DatabaseBackend::MySQL,
        }
    }

    /// Run raw SQL and decode the returned rows.
    ///
    /// Returns the column names (empty when no rows came back) and the cells.
    pub async fn fetch(&mut self, sql: &str) -> Result<(Vec<String>, Vec<Vec<CellValue>>)> {
        let decoded = match self {
            DatabaseConnection::Sqlite(conn) => {
                let rows = Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await?;
                decode_rows(&rows)
            }
            DatabaseConnection::Postgres(conn) => {
                let rows = Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await?;
                decode_rows(&rows)
            }
            DatabaseConnection::MySql(conn) => {
                let rows = Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await?;
                decode_rows(&rows)
            }
        };
        Ok(decoded)
    }
}

fn decode_rows<R>(rows: &[R]) -> (Vec<String>, Vec<Vec<CellValue>>)
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i16: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let cells = rows
        .iter()
        .map(|row| (0..row.columns().len()).map(|idx| decode_cell(row, idx)).collect())
        .collect();
    (columns, cells)
}

/// Decode one cell, trying typed decodes before falling back to raw text.
///
/// Statements run through the simple-query protocol, so PostgreSQL and MySQL
/// hand back text-format values; the unchecked string decode covers types
/// without a dedicated branch (numeric, dates).
fn decode_cell<R>(row: &R, idx: usize) -> CellValue
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i16: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return CellValue::Null,
        Ok(_) => {}
        Err(_) => return CellValue::Null,
    }

    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return CellValue::Int(v);
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return CellValue::Int(v.into());
    }
    if let Ok(v) = row.try_get::<i16, _>(idx) {
        return CellValue::Int(v.into());
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return CellValue::Float(v);
    }
    if let Ok(v) = row.try_get::<f32, _>(idx) {
        return CellValue::Float(v.into());
    }
    if let Ok(v) = row.try_get::<bool, _>(idx) {
        return CellValue::Bool(v);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return CellValue::Text(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return CellValue::Bytes(v.len());
    }
    match row.try_get_unchecked::<String, _>(idx) {
        Ok(v) => CellValue::Text(v),
        Err(_) => CellValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_url() {
        assert_eq!(
            DatabaseBackend::from_url("postgresql://localhost/test").unwrap(),
            DatabaseBackend::PostgreSQL
        );
        assert_eq!(
            DatabaseBackend::from_url("postgres://localhost/test").unwrap(),
            DatabaseBackend::PostgreSQL
        );
        assert_eq!(
            DatabaseBackend::from_url("mysql://localhost/test").unwrap(),
            DatabaseBackend::MySQL
        );
        assert_eq!(
            DatabaseBackend::from_url("sqlite:///Chinook.db").unwrap(),
            DatabaseBackend::SQLite
        );
        assert_eq!(
            DatabaseBackend::from_url("Chinook.db").unwrap(),
            DatabaseBackend::SQLite
        );
    }

    #[test]
    fn test_unsupported_and_invalid_urls() {
        assert!(matches!(
            DatabaseBackend::from_url("mssql://localhost/test"),
            Err(SqlChatError::UnsupportedDatabaseType(_))
        ));
        assert!(matches!(
            DatabaseBackend::from_url("invalid://url"),
            Err(SqlChatError::InvalidDatabaseUrl(_))
        ));
    }

    #[test]
    fn test_normalize_sqlite_urls() {
        let backend = DatabaseBackend::SQLite;
        assert_eq!(normalize_url("sqlite:///Chinook.db", backend), "sqlite:Chinook.db");
        assert_eq!(normalize_url("sqlite://Chinook.db", backend), "sqlite:Chinook.db");
        assert_eq!(normalize_url("sqlite:data/x.db", backend), "sqlite:data/x.db");
        assert_eq!(normalize_url("Chinook.db", backend), "sqlite:Chinook.db");
        // four slashes keep the absolute path
        assert_eq!(normalize_url("sqlite:////tmp/x.db", backend), "sqlite:/tmp/x.db");
    }

    #[test]
    fn test_normalize_server_urls() {
        assert_eq!(
            normalize_url("mariadb://u@h/db", DatabaseBackend::MySQL),
            "mysql://u@h/db"
        );
        assert_eq!(
            normalize_url("postgres://u@h/db", DatabaseBackend::PostgreSQL),
            "postgres://u@h/db"
        );
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(DatabaseBackend::SQLite.quote_identifier("Album"), "\"Album\"");
        assert_eq!(DatabaseBackend::PostgreSQL.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(DatabaseBackend::MySQL.quote_identifier("Album"), "`Album`");
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(DatabaseBackend::PostgreSQL.to_string(), "PostgreSQL");
        assert_eq!(DatabaseBackend::MySQL.to_string(), "MySQL");
        assert_eq!(DatabaseBackend::SQLite.to_string(), "SQLite");
    }
}
