//! SQL toolkit
//!
//! The four tools the agent can call. Tool failures are returned to the model
//! as `Error: ...` text so it can correct itself; they never end the turn.

use crate::agent::prompt::query_checker_prompt;
use crate::database::SqlDatabase;
use crate::error::Result;
use crate::llm::{GenerationParams, LLMProvider, Message, ToolCall, ToolDefinition};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes a SQL statement
pub const QUERY_TOOL: &str = "sql_db_query";
/// Describes tables
pub const SCHEMA_TOOL: &str = "sql_db_schema";
/// Lists tables
pub const LIST_TABLES_TOOL: &str = "sql_db_list_tables";
/// Double-checks a statement with the model
pub const QUERY_CHECKER_TOOL: &str = "sql_db_query_checker";

/// Tools bound to one database and one model
#[derive(Clone)]
pub struct SqlToolkit {
    db: Arc<dyn SqlDatabase>,
    llm: Arc<dyn LLMProvider>,
}

impl SqlToolkit {
    pub fn new(db: Arc<dyn SqlDatabase>, llm: Arc<dyn LLMProvider>) -> Self {
        Self { db, llm }
    }

    /// Tool definitions advertised to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: QUERY_TOOL.to_string(),
                description: "Input to this tool is a detailed and correct SQL query, output is a \
                              result from the database. If the query is not correct, an error \
                              message will be returned. If an error is returned, rewrite the query, \
                              check the query, and try again. If you encounter an issue with Unknown \
                              column 'xxxx' in 'field list', use sql_db_schema to query the correct \
                              table fields."
                    .to_string(),
                parameters: query_parameters("A detailed and correct SQL query."),
            },
            ToolDefinition {
                name: SCHEMA_TOOL.to_string(),
                description: "Input to this tool is a comma-separated list of tables, output is the \
                              schema and sample rows for those tables. Be sure that the tables \
                              actually exist by calling sql_db_list_tables first! Example Input: \
                              table1, table2, table3"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "table_names": {
                            "type": "string",
                            "description": "A comma-separated list of the table names for which to return the schema. Example input: 'table1, table2, table3'"
                        }
                    },
                    "required": ["table_names"]
                }),
            },
            ToolDefinition {
                name: LIST_TABLES_TOOL.to_string(),
                description: "Input is an empty string, output is a comma-separated list of tables \
                              in the database."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "tool_input": {
                            "type": "string",
                            "description": "An empty string"
                        }
                    },
                    "required": []
                }),
            },
            ToolDefinition {
                name: QUERY_CHECKER_TOOL.to_string(),
                description: "Use this tool to double check if your query is correct before \
                              executing it. Always use this tool before executing a query with \
                              sql_db_query!"
                    .to_string(),
                parameters: query_parameters("A detailed and SQL query to be checked."),
            },
        ]
    }

    /// Run one tool call and return the text handed back to the model
    pub async fn invoke(&self, call: &ToolCall) -> String {
        debug!(tool = %call.name, "invoking tool");
        if !call.arguments.is_object() {
            return invalid_arguments(&call.name, &call.arguments);
        }
        let result = match call.name.as_str() {
            QUERY_TOOL => match call.str_arg("query") {
                Some(query) => self.db.execute(query).await,
                None => return missing_argument(QUERY_TOOL, "query"),
            },
            SCHEMA_TOOL => match call.str_arg("table_names") {
                Some(names) => self.describe_tables(names).await,
                None => return missing_argument(SCHEMA_TOOL, "table_names"),
            },
            LIST_TABLES_TOOL => self.db.list_tables().await.map(|tables| tables.join(", ")),
            QUERY_CHECKER_TOOL => match call.str_arg("query") {
                Some(query) => self.check_query(query).await,
                None => return missing_argument(QUERY_CHECKER_TOOL, "query"),
            },
            other => {
                warn!(tool = %other, "model requested unknown tool");
                return format!(
                    "Error: {} is not a valid tool, try one of [{}].",
                    other,
                    [QUERY_TOOL, SCHEMA_TOOL, LIST_TABLES_TOOL, QUERY_CHECKER_TOOL].join(", ")
                );
            }
        };

        match result {
            Ok(output) => output,
            Err(e) => {
                debug!(tool = %call.name, error = %e, "tool returned an error");
                format!("Error: {}", e)
            }
        }
    }

    async fn describe_tables(&self, names: &str) -> Result<String> {
        let tables: Vec<String> = names
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.db.table_info(&tables).await
    }

    async fn check_query(&self, query: &str) -> Result<String> {
        let prompt = query_checker_prompt(query, self.db.backend().name());
        let params = GenerationParams::new().with_temperature(0.0);
        let response = self
            .llm
            .generate(&[Message::user(prompt)], &[], Some(&params))
            .await?;
        Ok(response.content)
    }
}

fn query_parameters(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": description
            }
        },
        "required": ["query"]
    })
}

fn missing_argument(tool: &str, argument: &str) -> String {
    format!("Error: {} requires a '{}' argument.", tool, argument)
}

fn invalid_arguments(tool: &str, arguments: &serde_json::Value) -> String {
    let text = match arguments {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    format!("Error: invalid arguments for {}: {}", tool, text)
}
