//! Expression AST - the core of SQL expression building.
//!
//! This module provides a strongly-typed AST for SQL expressions
//! with exhaustive pattern matching enforced by the compiler.
//!
//! Column names are emitted bare. Every name reaching `Expr::Column` is
//! either a fixed schema column or the output of identifier sanitization,
//! so quoting is reserved for qualifiers that are full table paths.

use super::dialect::{Dialect, SqlDialect};
use super::query::{Query, SelectExpr};
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// What a column reference is qualified with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// Query-local alias or CTE name, emitted bare: `e.url_path`
    Alias(String),
    /// Fully-qualified table path, quoted: `` `proj.umami.events`.url_path ``
    Table(String),
}

impl Qualifier {
    pub fn alias(name: &str) -> Self {
        Qualifier::Alias(name.into())
    }

    pub fn table(path: &str) -> Self {
        Qualifier::Table(path.into())
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Qualifier::Alias(name) => ts.push(Token::Bare(name.clone())),
            Qualifier::Table(path) => ts.push(Token::Ident(path.clone())),
        };
        ts
    }
}

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens()` - the compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_qualifier.column
    Column {
        table: Option<Qualifier>,
        column: String,
    },

    /// Quoted name with no qualifier, e.g. a quoted SELECT alias
    /// referenced from ORDER BY.
    Ident(String),

    /// Literal values
    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Function call: name(args...)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// Median aggregate; spelled by the dialect
    Median(Box<Expr>),

    /// CASE WHEN... THEN... ELSE... END
    Case {
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// Subquery: (SELECT ...)
    Subquery(Box<Query>),

    /// IN: expr IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// Wildcard: * or table.*
    Star { table: Option<Qualifier> },

    /// Window function: `SUM(COUNT(*)) OVER(PARTITION BY ... ORDER BY ...)`
    WindowFunction {
        function: Box<Expr>,
        partition_by: Vec<Expr>,
        order_by: Vec<Expr>,
    },

    /// BI tool template variable: `{{name}}`
    Template(String),

    /// Optional template with a fallback literal:
    /// `[[ {{name}} --]] '/'`. When the variable is set, the trailing
    /// comment swallows the fallback, so this must be the last thing on its line.
    OptionalTemplate { name: String, fallback: Box<Expr> },

    /// Raw SQL expression passed directly to output without escaping.
    ///
    /// # Security Warning
    ///
    /// **Never pass user input to this variant.** Raw SQL is not sanitized
    /// and can lead to SQL injection vulnerabilities. Only use with:
    /// - Trusted, static SQL fragments (date part keywords, intervals)
    ///
    /// For user-provided values, use `Expr::Literal` variants which properly
    /// escape content for the target dialect.
    Raw(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    /// Numeric literal in its original spelling. Callers must validate it.
    Number(String),
    String(String),
    Timestamp(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    // Arithmetic
    Mul,
    Div,
    // String
    Like,
    NotLike,
}

// =============================================================================
// Expression to Tokens
// =============================================================================

impl Expr {
    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.append(&t.to_tokens());
                    ts.push(Token::Dot);
                }
                ts.push(Token::Bare(column.clone()));
            }

            Expr::Ident(name) => {
                ts.push(Token::Ident(name.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Number(n) => Token::LitNumber(n.clone()),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Timestamp(s) => Token::LitTimestamp(s.clone()),
                });
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens(dialect));
                ts.space();
                match op {
                    BinaryOperator::NotLike => {
                        ts.push(Token::Not).space().push(Token::Like);
                    }
                    other => {
                        ts.push(binary_op_to_token(*other));
                    }
                }
                ts.space();
                ts.append(&right.to_tokens(dialect));
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens(dialect));
                }
                ts.rparen();
            }

            Expr::Median(inner) => {
                ts.append(&dialect.emit_median(inner.to_tokens(dialect)));
            }

            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                for (when, then) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&when.to_tokens(dialect));
                    ts.space().push(Token::Then).space();
                    ts.append(&then.to_tokens(dialect));
                }
                if let Some(else_expr) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&else_expr.to_tokens(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::Subquery(query) => {
                ts.lparen();
                ts.append(&query.to_tokens(dialect));
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // Empty IN list: "x IN ()" is invalid SQL
                // "x IN ()" should be FALSE, "x NOT IN ()" should be TRUE
                if values.is_empty() {
                    ts.push(if *negated { Token::True } else { Token::False });
                } else {
                    ts.append(&expr.to_tokens(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens(dialect));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.append(&t.to_tokens());
                    ts.push(Token::Dot);
                }
                ts.push(Token::Star);
            }


            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
            } => {
                ts.append(&function.to_tokens(dialect));
                ts.space().push(Token::Over).lparen();
                if !partition_by.is_empty() {
                    ts.push(Token::PartitionBy).space();
                    for (i, expr) in partition_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&expr.to_tokens(dialect));
                    }
                }
                if !order_by.is_empty() {
                    if !partition_by.is_empty() {
                        ts.space();
                    }
                    ts.push(Token::OrderBy).space();
                    for (i, expr) in order_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&expr.to_tokens(dialect));
                    }
                }
                ts.rparen();
            }

            Expr::Template(name) => {
                ts.push(Token::Template(name.clone()));
            }

            Expr::OptionalTemplate { name, fallback } => {
                ts.push(Token::Raw("[[ ".into()))
                    .push(Token::Template(name.clone()))
                    .push(Token::Raw(" --]]".into()))
                    .space();
                ts.append(&fallback.to_tokens(dialect));
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }

        ts
    }

    /// Render this expression to SQL text.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
        BinaryOperator::Like => Token::Like,
        // Rendered as two keywords in to_tokens
        BinaryOperator::NotLike => Token::Like,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create an unqualified column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Create a column reference qualified by a query-local alias (alias.column).
pub fn table_col(alias: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(Qualifier::alias(alias)),
        column: column.into(),
    }
}

/// Create a column reference with an explicit qualifier.
pub fn qualified_col(qualifier: Option<&Qualifier>, column: &str) -> Expr {
    Expr::Column {
        table: qualifier.cloned(),
        column: column.into(),
    }
}

/// Create a quoted identifier reference.
pub fn ident(name: &str) -> Expr {
    Expr::Ident(name.into())
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Create a numeric literal from text already known to be a bare number.
pub fn lit_number(n: &str) -> Expr {
    Expr::Literal(Literal::Number(n.into()))
}

/// Create a string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

/// Create a timestamp literal.
pub fn lit_timestamp(s: &str) -> Expr {
    Expr::Literal(Literal::Timestamp(s.into()))
}

/// Create a star (*) expression.
pub fn star() -> Expr {
    Expr::Star { table: None }
}

/// Create a qualified star (qualifier.*) expression.
pub fn qualified_star(qualifier: Option<&Qualifier>) -> Expr {
    Expr::Star {
        table: qualifier.cloned(),
    }
}

/// BI tool template variable.
pub fn template(name: &str) -> Expr {
    Expr::Template(name.into())
}

/// Optional BI tool template variable that falls back to `fallback`.
pub fn optional_template(name: &str, fallback: Expr) -> Expr {
    Expr::OptionalTemplate {
        name: name.into(),
        fallback: Box::new(fallback),
    }
}

// =============================================================================
// Aggregate Functions
// =============================================================================

/// COUNT(expr)
pub fn count(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// COUNT(*)
pub fn count_star() -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![star()],
        distinct: false,
    }
}

/// COUNT(DISTINCT expr)
pub fn count_distinct(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: true,
    }
}

/// SUM(expr)
pub fn sum(expr: Expr) -> Expr {
    func("SUM", vec![expr])
}

/// AVG(expr)
pub fn avg(expr: Expr) -> Expr {
    func("AVG", vec![expr])
}

/// MIN(expr)
pub fn min(expr: Expr) -> Expr {
    func("MIN", vec![expr])
}

/// MAX(expr)
pub fn max(expr: Expr) -> Expr {
    func("MAX", vec![expr])
}

/// Median of expr, spelled per dialect.
pub fn median(expr: Expr) -> Expr {
    Expr::Median(Box::new(expr))
}

/// ANY_VALUE(expr)
pub fn any_value(expr: Expr) -> Expr {
    func("ANY_VALUE", vec![expr])
}

/// ROW_NUMBER(), for use with [`ExprExt::over`].
pub fn row_number() -> Expr {
    func("ROW_NUMBER", vec![])
}

/// NULLIF(expr, value)
pub fn nullif(expr: Expr, value: Expr) -> Expr {
    func("NULLIF", vec![expr, value])
}

/// ROUND(expr, digits)
pub fn round(expr: Expr, digits: i64) -> Expr {
    func("ROUND", vec![expr, lit_int(digits)])
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

/// `CASE WHEN condition THEN result END`
pub fn case_when(condition: Expr, result: Expr) -> Expr {
    Expr::Case {
        when_clauses: vec![(condition, result)],
        else_clause: None,
    }
}

/// Raw SQL expression (pass-through, no parsing).
///
/// # Security Warning
///
/// **Never pass user input to this function.** The SQL is not sanitized
/// and can lead to SQL injection vulnerabilities.
///
/// # Example
/// ```ignore
/// raw_sql("CURRENT_TIMESTAMP()")
/// raw_sql("INTERVAL 7 DAY")
/// ```
pub fn raw_sql(sql: &str) -> Expr {
    Expr::Raw(sql.into())
}

// =============================================================================
// Expression Builder Trait
// =============================================================================

/// Extension trait for building expressions fluently.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    // Comparison operators
    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }

    // Logical operators
    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    // Arithmetic operators
    fn mul(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Mul, other)
    }

    fn div(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Div, other)
    }

    // String operators
    fn like(self, pattern: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Like, pattern)
    }

    // NULL checks
    #[allow(clippy::wrong_self_convention)]
    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    // IN operator
    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: false,
        }
    }

    fn not_in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: true,
        }
    }

    /// Window over the whole result set: `expr OVER()`.
    fn over_all(self) -> Expr {
        self.over(vec![], vec![])
    }

    /// `expr OVER(PARTITION BY ... ORDER BY ...)`
    fn over(self, partition_by: Vec<Expr>, order_by: Vec<Expr>) -> Expr {
        Expr::WindowFunction {
            function: Box::new(self.into_expr()),
            partition_by,
            order_by,
        }
    }

    /// Alias this expression (for SELECT list).
    fn alias(self, name: &str) -> SelectExpr {
        SelectExpr::new(self.into_expr()).with_alias(name)
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n as i64)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Literal::String(s))
    }
}

impl From<Query> for Expr {
    /// Convert a Query into a scalar subquery expression.
    fn from(query: Query) -> Self {
        Expr::Subquery(Box::new(query))
    }
}

// =============================================================================
// Tests
// =============================================================================
