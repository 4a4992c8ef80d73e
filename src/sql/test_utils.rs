//! Test utilities for SQL emission validation.
//!
//! Provides helpers for validating that emitted SQL is syntactically correct
//! using sqlparser-rs for roundtrip validation. Output containing BI tool
//! template syntax (`{{...}}`, `[[...]]`) is not plain SQL and cannot be
//! checked this way.

use sqlparser::dialect::BigQueryDialect;
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Validates that a SQL string is syntactically valid for the given dialect.
///
/// # Example
///
/// ```ignore
/// use crate::sql::test_utils::validate_sql;
/// use crate::sql::dialect::Dialect;
///
/// let sql = "SELECT * FROM `proj.umami.public_website_event`";
/// validate_sql(sql, Dialect::BigQuery).unwrap();
/// ```
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::BigQuery => Box::new(BigQueryDialect {}),
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM `proj.umami.events`", Dialect::BigQuery).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        let result = validate_sql("SELEC * FORM users", Dialect::BigQuery);
        assert!(result.is_err());
    }
}
