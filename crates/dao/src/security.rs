//! Security utilities for SQL identifier handling
//!
//! Table and column names come from descriptors and end up verbatim in generated SQL,
//! so every one of them passes [`validate_identifier`] before a DAO is built.

use crate::error::DaoError;

/// Characters allowed in SQL identifiers (alphanumeric, underscore, dollar)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$";

/// Longest identifier accepted (PostgreSQL limit)
const MAX_IDENTIFIER_LEN: usize = 63;

/// SQL keywords that cannot be used as bare identifiers
static SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "UNION", "DROP",
    "CREATE", "ALTER", "GRANT", "REVOKE", "TRUNCATE", "EXEC", "EXECUTE", "DECLARE", "TABLE",
    "ORDER", "GROUP", "LIMIT", "OFFSET", "AND", "OR", "NOT", "NULL",
];

/// Escape a SQL identifier by doubling quotes and wrapping it in double quotes
pub fn escape_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Validate that an identifier is safe to splice into SQL text
///
/// `kind` names what is being validated ("table", "column") for the error message.
pub fn validate_identifier(kind: &str, identifier: &str) -> Result<(), DaoError> {
    let first = identifier
        .chars()
        .next()
        .ok_or_else(|| DaoError::invalid(format!("{} name cannot be empty", kind)))?;

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(DaoError::invalid(format!(
            "{} name '{}' is too long (max {} characters)",
            kind, identifier, MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(c) = identifier.chars().find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c)) {
        return Err(DaoError::invalid(format!(
            "{} name '{}' contains invalid character '{}'",
            kind, identifier, c
        )));
    }

    if first.is_ascii_digit() {
        return Err(DaoError::invalid(format!(
            "{} name '{}' cannot start with a number",
            kind, identifier
        )));
    }

    if SQL_KEYWORDS.contains(&identifier.to_uppercase().as_str()) {
        return Err(DaoError::invalid(format!(
            "{} name '{}' is a reserved SQL keyword",
            kind, identifier
        )));
    }

    Ok(())
}
