//! SQL Dialect definitions and formatting rules.
//!
//! Identifier quoting, string escaping, timestamp formatting and median
//! aggregation go through `SqlDialect`. Other function names are emitted as
//! written and pass through `remap_function`.
//!
//! # Usage
//!
//! ```ignore
//! use chartsql::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::BigQuery;
//! let quoted = dialect.quote_identifier("proj.umami.public_session"); // `proj.umami.public_session`
//! ```
//!
//! Only BigQuery is implemented today; the event-log schema and the BI tool
//! templating both assume it.

mod bigquery;
pub mod helpers;

pub use bigquery::BigQuery;

use super::token::{Token, TokenStream};
use crate::model::DateFormat;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table path, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// Single quotes are doubled.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a timestamp literal.
    fn format_timestamp_literal(&self, value: &str) -> String {
        format!("TIMESTAMP {}", self.quote_string(value))
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT clause. Limits beyond the INT64 range saturate.
    fn emit_limit(&self, limit: u64) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(i64::try_from(limit).unwrap_or(i64::MAX)));
        ts
    }

    // =========================================================================
    // Date/Time
    // =========================================================================

    /// Name of the function that renders a timestamp with a format string.
    fn format_timestamp_function(&self) -> &'static str {
        "TO_CHAR"
    }

    /// Format string for bucketing timestamps at the given granularity.
    fn timestamp_format(&self, format: DateFormat) -> &'static str;

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Emit a median over an already-rendered argument.
    fn emit_median(&self, arg: TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("MEDIAN".into()))
            .lparen()
            .append(&arg)
            .rparen();
        ts
    }

    // =========================================================================
    // Function Remapping
    // =========================================================================

    /// Remap a function name for this dialect.
    ///
    /// Returns `Some(new_name)` if the function should be remapped, `None` to keep original.
    /// The input is matched case-insensitively.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    BigQuery,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::BigQuery => &BigQuery,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_timestamp_literal(&self, value: &str) -> String {
        self.dialect().format_timestamp_literal(value)
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.dialect().emit_limit(limit)
    }

    fn format_timestamp_function(&self) -> &'static str {
        self.dialect().format_timestamp_function()
    }

    fn timestamp_format(&self, format: DateFormat) -> &'static str {
        self.dialect().timestamp_format(format)
    }

    fn emit_median(&self, arg: TokenStream) -> TokenStream {
        self.dialect().emit_median(arg)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
