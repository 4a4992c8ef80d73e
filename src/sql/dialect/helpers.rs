//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use crate::model::DateFormat;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with backticks.
/// Used by: BigQuery
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with single quotes for dialects where backslash is an
/// escape character inside literals.
/// Used by: BigQuery
pub fn quote_string_backslash(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

// =============================================================================
// Date Formatting
// =============================================================================

/// strftime-style pattern for each date bucket.
/// Used by: BigQuery (`FORMAT_TIMESTAMP`)
pub fn strftime_pattern(format: DateFormat) -> &'static str {
    match format {
        DateFormat::Year => "%Y",
        DateFormat::Month => "%Y-%m",
        DateFormat::Week => "%G-W%V",
        DateFormat::Day => "%Y-%m-%d",
        DateFormat::Hour => "%Y-%m-%d %H:00",
        DateFormat::Minute => "%Y-%m-%d %H:%M",
    }
}

// =============================================================================
// Function Remapping
// =============================================================================

/// Remap functions for BigQuery dialect.
pub fn remap_function_bigquery(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "STRFTIME" => Some("FORMAT_TIMESTAMP"),
        "TO_CHAR" => Some("FORMAT_TIMESTAMP"),
        "DATE_FORMAT" => Some("FORMAT_TIMESTAMP"),
        "NVL" => Some("IFNULL"),
        "ISNULL" => Some("IFNULL"),
        "LENGTH" => Some("CHAR_LENGTH"),
        _ => None,
    }
}
