//! Query builder - construct SQL queries with a fluent API.
//!
//! Output layout is fixed: one SELECT item per indented line, one WHERE
//! condition per line. BI tool optional clauses (`[[ ... ]]`) and trailing
//! `--` comments rely on that line structure.

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// How a SELECT alias is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasStyle {
    /// Emitted verbatim: `AS dato`
    #[default]
    Bare,
    /// Quoted by the dialect: ``AS `Besøk` ``
    Quoted,
}

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
    pub alias_style: AliasStyle,
    /// Trailing block comment, used to annotate degraded output.
    pub comment: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            alias: None,
            alias_style: AliasStyle::Bare,
            comment: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_alias_style(mut self, style: AliasStyle) -> Self {
        self.alias_style = style;
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens(dialect);
        if let Some(alias) = &self.alias {
            ts.space().push(Token::As).space().push(match self.alias_style {
                AliasStyle::Bare => Token::Bare(alias.clone()),
                AliasStyle::Quoted => Token::Ident(alias.clone()),
            });
        }
        if let Some(comment) = &self.comment {
            ts.space().push(Token::Comment(comment.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table Reference
// =============================================================================

/// What a FROM/JOIN item reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// Physical table path, quoted by the dialect.
    Table(String),
    /// CTE defined earlier in the same statement, emitted bare.
    Cte(String),
}

/// A table reference with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub source: TableSource,
    pub alias: Option<String>,
}

impl TableRef {
    /// Physical table, e.g. `project.dataset.table`.
    pub fn new(path: &str) -> Self {
        Self {
            source: TableSource::Table(path.into()),
            alias: None,
        }
    }

    /// Reference to a CTE by name.
    pub fn cte(name: &str) -> Self {
        Self {
            source: TableSource::Cte(name.into()),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(match &self.source {
            TableSource::Table(path) => Token::Ident(path.clone()),
            TableSource::Cte(name) => Token::Bare(name.clone()),
        });
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Bare(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// A JOIN clause. Each ON condition is written on its own line.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Vec<Expr>,
}

impl Join {
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        if self.join_type == JoinType::Left {
            ts.push(Token::Left).space();
        }
        ts.push(Token::Join).space();
        ts.append(&self.table.to_tokens());

        for (i, cond) in self.on.iter().enumerate() {
            ts.newline().indent(1);
            ts.push(if i == 0 { Token::On } else { Token::And });
            ts.space();
            ts.append(&cond.to_tokens(dialect));
        }

        ts
    }
}

// =============================================================================
// WHERE conditions
// =============================================================================

/// One line of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Regular predicate, ANDed with the rest.
    Expr(Expr),
    /// Optional BI tool clause: `[[ AND {{name}} ]]`. The tool drops the
    /// whole bracket when the variable is unset.
    Optional(String),
}

impl Condition {
    fn to_tokens(&self, dialect: Dialect, first: bool) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Condition::Expr(expr) => {
                if !first {
                    ts.push(Token::And).space();
                }
                ts.append(&expr.to_tokens(dialect));
            }
            Condition::Optional(name) => {
                ts.push(Token::Raw("[[ ".into()));
                if !first {
                    ts.push(Token::And).space();
                }
                ts.push(Token::Template(name.clone()))
                    .push(Token::Raw(" ]]".into()));
            }
        }
        ts
    }
}

impl From<Expr> for Condition {
    fn from(expr: Expr) -> Self {
        Condition::Expr(expr)
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, dir: None }
    }

    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Desc),
        }
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens(dialect);

        if let Some(dir) = &self.dir {
            ts.space().push(match dir {
                SortDir::Asc => Token::Asc,
                SortDir::Desc => Token::Desc,
            });
        }

        ts
    }
}

// =============================================================================
// CTE (Common Table Expression)
// =============================================================================

/// A Common Table Expression (WITH clause).
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Cte {
    pub name: String,
    pub query: Box<Query>,
}

impl Cte {
    pub fn new(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            query: Box::new(query),
        }
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Bare(self.name.clone()))
            .space()
            .push(Token::As)
            .space()
            .lparen()
            .newline()
            .append(&self.query.to_tokens(dialect))
            .newline()
            .rparen();
        ts
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql() or to_tokens()"]
pub struct Query {
    pub with: Vec<Cte>,
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub conditions: Vec<Condition>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a CTE (WITH clause).
    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.with.push(cte);
        self
    }

    /// Set the SELECT list.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Set the FROM table.
    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    /// Add a JOIN.
    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Vec<Expr>) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on,
        });
        self
    }

    /// Add a LEFT JOIN.
    pub fn left_join(self, table: TableRef, on: Vec<Expr>) -> Self {
        self.join(JoinType::Left, table, on)
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Add several WHERE conditions.
    pub fn filters(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    /// Set the GROUP BY clause.
    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    /// Set the ORDER BY clause.
    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // WITH clause
        if !self.with.is_empty() {
            ts.push(Token::With).space();
            for (i, cte) in self.with.iter().enumerate() {
                if i > 0 {
                    ts.comma().newline();
                }
                ts.append(&cte.to_tokens(dialect));
            }
            ts.newline();
        }

        // SELECT
        ts.push(Token::Select);
        for (i, select_expr) in self.select.iter().enumerate() {
            if i == 0 {
                ts.newline().indent(1);
            } else {
                ts.comma().newline().indent(1);
            }
            ts.append(&select_expr.to_tokens(dialect));
        }

        // FROM
        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens());
        }

        // JOINs
        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens(dialect));
        }

        // WHERE
        for (i, cond) in self.conditions.iter().enumerate() {
            if i == 0 {
                ts.newline().push(Token::Where).space();
            } else {
                ts.newline().indent(1);
            }
            ts.append(&cond.to_tokens(dialect, i == 0));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens(dialect));
            }
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens(dialect));
            }
        }

        // LIMIT
        if let Some(limit) = self.limit {
            ts.newline();
            ts.append(&dialect.emit_limit(limit));
        }

        ts
    }

    /// Generate SQL string for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Query {
    /// Formats the query using the default dialect (BigQuery).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

// =============================================================================
// Tests
// =============================================================================
