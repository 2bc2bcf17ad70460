//! Database Manager
//!
//! This module implements the DatabaseManager struct which owns the session's
//! connection, executes statements on it, and answers the schema questions
//! the SQL toolkit asks.

use crate::database::connection::{DatabaseBackend, DatabaseConnection};
use crate::database::format::{render_rows, render_sample, CellValue};
use crate::database::SqlDatabase;
use crate::error::{Result, SqlChatError};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

/// Rows shown under each table in `table_info`
const DEFAULT_SAMPLE_ROWS: usize = 3;

/// Column metadata used to describe a table
#[derive(Debug, Clone, PartialEq)]
struct ColumnInfo {
    name: String,
    data_type: String,
    not_null: bool,
}

/// Database Manager
///
/// Holds one connection behind an async mutex so that statements from the
/// transaction meta-commands and from the agent's tools run in order on the
/// same database session.
pub struct DatabaseManager {
    /// The session's connection
    conn: Mutex<DatabaseConnection>,
    /// Database backend type
    backend: DatabaseBackend,
    /// Rows sampled per table in schema descriptions
    sample_rows: usize,
}

impl DatabaseManager {
    /// Connects to the database at `url`
    ///
    /// # Example
    /// ```no_run
    /// use sql_chat::database::DatabaseManager;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let manager = DatabaseManager::connect("sqlite:///Chinook.db").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        let conn = DatabaseConnection::connect(url).await?;
        let backend = conn.backend();
        Ok(Self {
            conn: Mutex::new(conn),
            backend,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        })
    }

    /// Run raw SQL on the session connection
    async fn fetch(&self, sql: &str) -> Result<(Vec<String>, Vec<Vec<CellValue>>)> {
        debug!(sql = %sql, "executing statement");
        let mut conn = self.conn.lock().await;
        conn.fetch(sql).await
    }

    async fn columns_of(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let literal = table.replace('\'', "''");
        let sql = match self.backend {
            DatabaseBackend::SQLite => {
                format!("PRAGMA table_info({})", self.backend.quote_identifier(table))
            }
            DatabaseBackend::PostgreSQL => format!(
                "SELECT column_name::text, data_type::text, is_nullable::text \
                 FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = '{}' \
                 ORDER BY ordinal_position",
                literal
            ),
            DatabaseBackend::MySQL => format!(
                "SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR), \
                 CAST(is_nullable AS CHAR) \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = '{}' \
                 ORDER BY ordinal_position",
                literal
            ),
        };

        let (_, rows) = self.fetch(&sql).await?;
        let columns = rows
            .into_iter()
            .filter_map(|row| match self.backend {
                // cid, name, type, notnull, dflt_value, pk
                DatabaseBackend::SQLite if row.len() >= 4 => Some(ColumnInfo {
                    name: row[1].plain(),
                    data_type: row[2].plain(),
                    not_null: row[3].plain() == "1",
                }),
                DatabaseBackend::PostgreSQL | DatabaseBackend::MySQL if row.len() >= 3 => {
                    Some(ColumnInfo {
                        name: row[0].plain(),
                        data_type: row[1].plain(),
                        not_null: row[2].plain().eq_ignore_ascii_case("NO"),
                    })
                }
                _ => None,
            })
            .collect();
        Ok(columns)
    }

    async fn create_statement(&self, table: &str, columns: &[ColumnInfo]) -> Result<String> {
        if self.backend == DatabaseBackend::SQLite {
            let sql = format!(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = '{}'",
                table.replace('\'', "''")
            );
            let (_, rows) = self.fetch(&sql).await?;
            if let Some(CellValue::Text(ddl)) = rows.first().and_then(|r| r.first()) {
                return Ok(ddl.clone());
            }
        }
        Ok(synthesize_create(&self.backend.quote_identifier(table), columns))
    }
}

/// Build a `CREATE TABLE` statement from column metadata
fn synthesize_create(quoted_table: &str, columns: &[ColumnInfo]) -> String {
    let body: Vec<String> = columns
        .iter()
        .map(|c| {
            let mut line = format!("\t{} {}", c.name, c.data_type);
            if c.not_null {
                line.push_str(" NOT NULL");
            }
            line
        })
        .collect();
    format!("CREATE TABLE {} (\n{}\n)", quoted_table, body.join(",\n"))
}

#[async_trait]
impl SqlDatabase for DatabaseManager {
    async fn execute(&self, sql: &str) -> Result<String> {
        let (_, rows) = self.fetch(sql).await?;
        Ok(render_rows(&rows))
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = match self.backend {
            DatabaseBackend::SQLite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            DatabaseBackend::PostgreSQL => {
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                 ORDER BY table_name"
            }
            DatabaseBackend::MySQL => {
                "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
                 ORDER BY table_name"
            }
        };
        let (_, rows) = self.fetch(sql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|cell| cell.plain())
            .collect())
    }

    async fn table_info(&self, tables: &[String]) -> Result<String> {
        let known = self.list_tables().await?;
        let missing: Vec<&str> = tables
            .iter()
            .filter(|t| !known.contains(t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(SqlChatError::NotFound(format!(
                "table_names {{{}}} not found in database",
                missing.join(", ")
            )));
        }

        let mut sections = Vec::with_capacity(tables.len());
        for table in tables {
            let columns = self.columns_of(table).await?;
            let ddl = self.create_statement(table, &columns).await?;

            let mut section = ddl;
            if self.sample_rows > 0 {
                let sql = format!(
                    "SELECT * FROM {} LIMIT {}",
                    self.backend.quote_identifier(table),
                    self.sample_rows
                );
                let (_, rows) = self.fetch(&sql).await?;
                let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
                section.push_str(&format!(
                    "\n\n/*\n{} rows from {} table:\n{}\n*/",
                    self.sample_rows,
                    table,
                    render_sample(&names, &rows)
                ));
            }
            sections.push(section);
        }
        Ok(sections.join("\n\n"))
    }

    fn backend(&self) -> DatabaseBackend {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_create() {
        let columns = vec![
            ColumnInfo {
                name: "ArtistId".to_string(),
                data_type: "integer".to_string(),
                not_null: true,
            },
            ColumnInfo {
                name: "Name".to_string(),
                data_type: "character varying".to_string(),
                not_null: false,
            },
        ];
        let ddl = synthesize_create("\"artist\"", &columns);
        assert_eq!(
            ddl,
            "CREATE TABLE \"artist\" (\n\tArtistId integer NOT NULL,\n\tName character varying\n)"
        );
    }

    #[tokio::test]
    async fn test_unreachable_database_is_an_error() {
        let result = DatabaseManager::connect("sqlite:///definitely/missing/dir/x.db").await;
        assert!(matches!(
            result,
            Err(SqlChatError::DatabaseConnection { .. })
        ));
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let manager = DatabaseManager::connect("sqlite::memory:").await.unwrap();
        manager
            .execute("CREATE TABLE Artist (ArtistId INTEGER PRIMARY KEY NOT NULL, Name TEXT)")
            .await
            .unwrap();
        manager
            .execute("INSERT INTO Artist (ArtistId, Name) VALUES (1, 'AC/DC'), (2, 'Accept')")
            .await
            .unwrap();

        let result = manager
            .execute("SELECT ArtistId, Name FROM Artist ORDER BY ArtistId")
            .await
            .unwrap();
        assert_eq!(result, "[(1, 'AC/DC'), (2, 'Accept')]");

        let count = manager.execute("SELECT COUNT(*) FROM Artist").await.unwrap();
        assert_eq!(count, "[(2,)]");

        assert_eq!(manager.list_tables().await.unwrap(), vec!["Artist".to_string()]);

        let info = manager.table_info(&["Artist".to_string()]).await.unwrap();
        assert!(info.starts_with("CREATE TABLE Artist"));
        assert!(info.contains("3 rows from Artist table:"));
        assert!(info.contains("ArtistId\tName"));
        assert!(info.contains("1\tAC/DC"));

        let missing = manager.table_info(&["Album".to_string()]).await;
        assert!(matches!(missing, Err(SqlChatError::NotFound(_))));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_statement_futures_are_send() {
        let manager = DatabaseManager::connect("sqlite::memory:").await.unwrap();
        let future = manager.execute("SELECT 1");
        assert_send(&future);
        assert_eq!(future.await.unwrap(), "[(1,)]");

        let future = manager.fetch("SELECT 2");
        assert_send(&future);
        let (columns, rows) = future.await.unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_transaction_statements() {
        let manager = DatabaseManager::connect("sqlite::memory:").await.unwrap();
        manager.execute("CREATE TABLE t (id INTEGER)").await.unwrap();

        manager.execute("BEGIN TRANSACTION;").await.unwrap();
        manager.execute("INSERT INTO t VALUES (1)").await.unwrap();
        manager.execute("ROLLBACK;").await.unwrap();

        let count = manager.execute("SELECT COUNT(*) FROM t").await.unwrap();
        assert_eq!(count, "[(0,)]");

        // COMMIT without an open transaction is a database error
        assert!(manager.execute("COMMIT;").await.is_err());
    }
}
