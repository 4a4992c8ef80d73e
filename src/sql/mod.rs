//! SQL generation module.
//!
//! This module provides a type-safe SQL builder for the warehouse dialect.
//! It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    any_value, avg, case_when, col, count, count_distinct, count_star, func, ident, lit_int,
    lit_number, lit_str, lit_timestamp, max, median, min, nullif, optional_template,
    qualified_col, qualified_star, raw_sql, round, row_number, star, sum, table_col, template,
    BinaryOperator, Expr, ExprExt, Literal, Qualifier,
};
pub use query::{
    AliasStyle, Condition, Cte, Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir,
    TableRef, TableSource,
};
pub use token::{Token, TokenStream};
