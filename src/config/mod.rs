//! Configuration module
//!
//! Settings are read from the process environment (after `.env` has been
//! loaded by `main`). Nothing is persisted between runs.

pub mod policy;

pub use policy::SessionPolicy;

use crate::database::connection::DatabaseBackend;
use crate::error::{Result, SqlChatError};
use comfy_table::{presets::UTF8_FULL, Table};

/// Default database when `DATABASE_URI` is not set
pub const DEFAULT_DATABASE_URI: &str = "sqlite:///Chinook.db";

/// Default chat model
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Default LLM provider
pub const DEFAULT_LLM_PROVIDER: &str = "openai";

/// Default row limit suggested to the agent
pub const DEFAULT_TOP_K: usize = 5;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Database connection URI
    pub database_uri: String,
    /// Dialect name shown to the agent and the user (e.g. "SQLite")
    pub database_type: String,
    /// Model identifier
    pub llm_model: String,
    /// Provider name
    pub llm_provider: String,
    /// API key for the provider
    pub api_key: String,
    /// Initial debug flag
    pub debug_mode: bool,
    /// Initial batch flag
    pub batch_mode: bool,
    /// Agent step budget per turn
    pub recursion_limit: usize,
    /// Row limit suggested to the agent
    pub top_k: usize,
    /// Which session flavour to run
    pub policy: SessionPolicy,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| SqlChatError::LLMApiKeyMissing("OPENAI_API_KEY".to_string()))?;

        let llm_provider = get("LLM_PROVIDER")
            .unwrap_or_else(|| DEFAULT_LLM_PROVIDER.to_string())
            .to_lowercase();
        if llm_provider != "openai" {
            return Err(SqlChatError::config(format!(
                "Unsupported LLM_PROVIDER '{}'. Supported: openai",
                llm_provider
            )));
        }

        let database_uri = get("DATABASE_URI").unwrap_or_else(|| DEFAULT_DATABASE_URI.to_string());
        let database_type = match get("DATABASE_TYPE") {
            Some(value) => value,
            None => DatabaseBackend::from_url(&database_uri)?.name().to_string(),
        };

        let policy = match get("SESSION_POLICY") {
            Some(value) => value.parse()?,
            None => SessionPolicy::default(),
        };

        let recursion_limit = match get("RECURSION_LIMIT") {
            Some(value) => parse_number("RECURSION_LIMIT", &value)?,
            None => policy.default_recursion_limit(),
        };
        if recursion_limit == 0 {
            return Err(SqlChatError::config("RECURSION_LIMIT must be at least 1"));
        }

        let top_k = match get("TOP_K_RESULTS") {
            Some(value) => parse_number("TOP_K_RESULTS", &value)?,
            None => DEFAULT_TOP_K,
        };

        Ok(Self {
            database_uri,
            database_type,
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_provider,
            api_key,
            debug_mode: get("DEBUG_MODE").map(|v| parse_flag(&v)).unwrap_or(false),
            batch_mode: get("BATCH_MODE").map(|v| parse_flag(&v)).unwrap_or(true),
            recursion_limit,
            top_k,
            policy,
        })
    }

    /// Render the settings as a table for the `config` meta-command
    pub fn render_table(&self, debug: bool, batch: bool) -> String {
        let on_off = |flag: bool| if flag { "ON" } else { "OFF" };

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Setting", "Value"]);
        table.add_row(vec!["Database", self.database_type.as_str()]);
        table.add_row(vec!["Database URI", self.database_uri.as_str()]);
        table.add_row(vec![
            "LLM".to_string(),
            format!("{}/{}", self.llm_provider, self.llm_model),
        ]);
        table.add_row(vec!["Session policy", self.policy.name()]);
        table.add_row(vec!["Debug mode", on_off(debug)]);
        if self.policy.allows_batch_toggle() {
            table.add_row(vec!["Batch mode", on_off(batch)]);
        }
        table.add_row(vec![
            "Recursion limit".to_string(),
            self.recursion_limit.to_string(),
        ]);
        table.add_row(vec!["Top K results".to_string(), self.top_k.to_string()]);
        table.to_string()
    }
}

/// `"true"` in any case enables a flag; anything else disables it.
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        SqlChatError::config(format!("{} must be a positive integer, got '{}'", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(settings.database_uri, DEFAULT_DATABASE_URI);
        assert_eq!(settings.database_type, "SQLite");
        assert_eq!(settings.llm_model, "gpt-4o-mini");
        assert_eq!(settings.llm_provider, "openai");
        assert!(!settings.debug_mode);
        assert!(settings.batch_mode);
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.policy, SessionPolicy::Transactional);
        assert_eq!(settings.recursion_limit, 100);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let result = settings_from(&[("LLM_MODEL", "gpt-4o")]);
        assert!(matches!(result, Err(SqlChatError::LLMApiKeyMissing(_))));

        let result = settings_from(&[("OPENAI_API_KEY", "   ")]);
        assert!(matches!(result, Err(SqlChatError::LLMApiKeyMissing(_))));
    }

    #[test]
    fn test_flags_and_numbers() {
        let settings = settings_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("DEBUG_MODE", "TRUE"),
            ("BATCH_MODE", "no"),
            ("RECURSION_LIMIT", "25"),
            ("TOP_K_RESULTS", "10"),
            ("SESSION_POLICY", "batch"),
        ])
        .unwrap();
        assert!(settings.debug_mode);
        assert!(!settings.batch_mode);
        assert_eq!(settings.recursion_limit, 25);
        assert_eq!(settings.top_k, 10);
        assert_eq!(settings.policy, SessionPolicy::Batch);
    }

    #[test]
    fn test_policy_sets_default_limit() {
        let settings =
            settings_from(&[("OPENAI_API_KEY", "sk-test"), ("SESSION_POLICY", "plain")]).unwrap();
        assert_eq!(settings.recursion_limit, 80);
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(settings_from(&[("OPENAI_API_KEY", "k"), ("RECURSION_LIMIT", "many")]).is_err());
        assert!(settings_from(&[("OPENAI_API_KEY", "k"), ("RECURSION_LIMIT", "0")]).is_err());
        assert!(settings_from(&[("OPENAI_API_KEY", "k"), ("TOP_K_RESULTS", "-1")]).is_err());
    }

    #[test]
    fn test_database_type_follows_uri() {
        let settings = settings_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("DATABASE_URI", "postgresql://localhost/chinook"),
        ])
        .unwrap();
        assert_eq!(settings.database_type, "PostgreSQL");

        let settings = settings_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("DATABASE_URI", "postgresql://localhost/chinook"),
            ("DATABASE_TYPE", "Postgres 16"),
        ])
        .unwrap();
        assert_eq!(settings.database_type, "Postgres 16");
    }

    #[test]
    fn test_unsupported_provider() {
        let result = settings_from(&[("OPENAI_API_KEY", "k"), ("LLM_PROVIDER", "cohere")]);
        assert!(matches!(result, Err(SqlChatError::Config(_))));
    }

    #[test]
    fn test_render_table() {
        let settings = settings_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        let rendered = settings.render_table(true, false);
        assert!(rendered.contains("Database URI"));
        assert!(rendered.contains("sqlite:///Chinook.db"));
        assert!(rendered.contains("openai/gpt-4o-mini"));
        assert!(rendered.contains("ON"));
        // batch row only shown for the batch policy
        assert!(!rendered.contains("Batch mode"));
    }
}
