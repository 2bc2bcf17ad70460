//! Modification heuristics
//!
//! Two table-driven keyword checks: one over free-text user input, one over
//! a single SQL statement. Both are hints used for console output only; they
//! never gate what the agent is allowed to run.

/// Words whose presence in a question suggests the user wants data changed.
pub const MODIFICATION_KEYWORDS: &[&str] = &[
    "create", "add", "insert", "new", "make", "update", "change", "modify", "edit", "alter",
    "delete", "remove", "drop", "clear",
];

/// Statement prefixes that mutate stored data or schema.
pub const MODIFICATION_STATEMENTS: &[&str] =
    &["INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE"];

/// Returns true when `text` contains any of `keywords` as a substring,
/// ignoring case. No tokenization: "recreate" matches "create".
pub fn contains_any_keyword(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

/// Detect whether a natural-language request likely asks for a modification.
pub fn requires_modification(text: &str) -> bool {
    contains_any_keyword(text, MODIFICATION_KEYWORDS)
}

/// Detect whether a SQL statement is a modification.
pub fn is_modification_query(sql: &str) -> bool {
    let normalized = sql.trim().to_uppercase();
    MODIFICATION_STATEMENTS
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
}
