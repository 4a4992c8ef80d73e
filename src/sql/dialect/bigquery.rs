//! BigQuery SQL dialect.
//!
//! BigQuery features used by the planner:
//! - Backtick identifier quoting, including whole `project.dataset.table` paths
//! - Backslash escapes inside string literals
//! - `FORMAT_TIMESTAMP` with strftime-style patterns
//! - No MEDIAN aggregate (`APPROX_QUANTILES` instead)

use super::helpers;
use super::SqlDialect;
use crate::model::DateFormat;
use crate::sql::token::{Token, TokenStream};

/// BigQuery SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_backslash(s)
    }

    fn format_timestamp_function(&self) -> &'static str {
        "FORMAT_TIMESTAMP"
    }

    fn timestamp_format(&self, format: DateFormat) -> &'static str {
        helpers::strftime_pattern(format)
    }

    fn emit_median(&self, arg: TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("APPROX_QUANTILES".into()))
            .lparen()
            .append(&arg)
            .comma()
            .space()
            .push(Token::LitInt(2))
            .rparen()
            .push(Token::Raw("[OFFSET(1)]".into()));
        ts
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_bigquery(name)
    }
}
