//! Filter compilation - one filter to zero or more WHERE lines.

use crate::model::{
    DateRangeType, Filter, Operator, Parameter, ParameterType, CREATED_AT, VISIT_DURATION,
};
use crate::sql::{
    func, lit_number, lit_str, lit_timestamp, qualified_col, raw_sql, BinaryOperator, Condition,
    Expr, ExprExt, Qualifier,
};

use super::columns::{
    is_numeric, is_param_reference, is_session_column, is_text_column, param_column,
    resolve_parameter, sanitize_identifier, URL_FULLPATH,
};
use super::gap::{Diagnostics, Gap};
use super::template;
use super::PlanContext;

/// How values compared against a column are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Unquoted when the value is a bare number, quoted otherwise.
    Auto,
    /// Always a string literal.
    Text,
    /// `TIMESTAMP '...'`
    Timestamp,
}

impl ValueKind {
    pub fn for_column(column: &str) -> Self {
        if column == CREATED_AT {
            ValueKind::Timestamp
        } else if is_text_column(column) {
            ValueKind::Text
        } else {
            ValueKind::Auto
        }
    }

    pub fn for_parameter(param: &Parameter) -> Self {
        match param.param_type {
            ParameterType::String => ValueKind::Text,
            ParameterType::Number => ValueKind::Auto,
        }
    }

    pub fn literal(&self, value: &str) -> Expr {
        match self {
            ValueKind::Auto if is_numeric(value) => lit_number(value),
            ValueKind::Auto | ValueKind::Text => lit_str(value),
            ValueKind::Timestamp => lit_timestamp(value),
        }
    }
}

/// How column references are qualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnScope {
    /// Inside `base_query`: event, session or visit CTE qualifier.
    Base,
    /// Inside a single-table query (visit CTEs, `andel` denominators).
    /// `param_` filters do not apply there.
    Bare,
}

/// Compiles filters against the `base_query` tables or a single table.
pub struct PredicateCompiler<'a> {
    ctx: &'a PlanContext<'a>,
    scope: ColumnScope,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(ctx: &'a PlanContext<'a>) -> Self {
        Self {
            ctx,
            scope: ColumnScope::Base,
        }
    }

    pub fn bare(ctx: &'a PlanContext<'a>) -> Self {
        Self {
            ctx,
            scope: ColumnScope::Bare,
        }
    }

    fn qualifier_for(&self, column: &str) -> Option<Qualifier> {
        match self.scope {
            ColumnScope::Bare => None,
            ColumnScope::Base if is_session_column(column) => Some(self.ctx.session_qualifier()),
            ColumnScope::Base if column == VISIT_DURATION => Some(self.ctx.visit_qualifier()),
            ColumnScope::Base => Some(self.ctx.event_qualifier()),
        }
    }

    /// Reference to `column` in this scope.
    pub fn column_expr(&self, column: &str) -> Expr {
        let qualifier = self.qualifier_for(column);
        if column == URL_FULLPATH {
            return url_fullpath(qualifier.as_ref());
        }
        qualified_col(qualifier.as_ref(), &sanitize_identifier(column))
    }

    /// Compile one filter into WHERE lines.
    ///
    /// Returns nothing for `visit_duration` bucket definitions, for `param_`
    /// filters in single-table scope, and for filters that cannot be
    /// compiled (recorded in `diags`).
    pub fn compile(&self, filter: &Filter, diags: &mut Diagnostics) -> Vec<Condition> {
        let column = filter.column.trim();
        if column.is_empty() {
            diags.push(Gap::EmptyFilter {
                column: String::new(),
            });
            return vec![];
        }
        if is_param_reference(column) {
            return self.param_condition(filter, column, diags);
        }
        if column == VISIT_DURATION && filter.custom_column.is_some() {
            return vec![];
        }

        if filter.is_template() {
            return vec![self.template_condition(filter, column)];
        }

        let target = self.column_expr(column);

        if column == CREATED_AT {
            match filter.date_range_type {
                Some(DateRangeType::Custom) | None => {}
                Some(preset) => return date_preset(target, preset),
            }
        }

        match compare(
            target,
            column,
            &filter.operator,
            filter.value(),
            &filter.multiple_values,
            ValueKind::for_column(column),
        ) {
            Ok(expr) => vec![Condition::Expr(expr)],
            Err(gap) => {
                diags.push(gap);
                vec![]
            }
        }
    }

    /// A `param_` filter tests the parameter's column in the attribute CTE,
    /// so it narrows events without touching other parameters.
    fn param_condition(&self, filter: &Filter, column: &str, diags: &mut Diagnostics) -> Vec<Condition> {
        if self.scope == ColumnScope::Bare {
            return vec![];
        }
        let Some(param) = resolve_parameter(self.ctx.parameters, column) else {
            diags.push(Gap::UnresolvedParameter {
                reference: column.to_string(),
            });
            return vec![];
        };
        let target = qualified_col(Some(&self.ctx.attributes_qualifier()), &param_column(param));
        let test = if filter.is_template() {
            let name = template::variable_name(filter.value.as_deref(), column);
            Ok(target.eq(template::required(&name)))
        } else {
            compare(
                target,
                column,
                &filter.operator,
                filter.value(),
                &filter.multiple_values,
                ValueKind::for_parameter(param),
            )
        };
        match test {
            Ok(expr) => vec![Condition::Expr(expr)],
            Err(gap) => {
                diags.push(gap);
                vec![]
            }
        }
    }

    fn template_condition(&self, filter: &Filter, column: &str) -> Condition {
        let name = template::variable_name(filter.value.as_deref(), column);
        match column {
            CREATED_AT => template::optional_clause(&name),
            "url_path" => Condition::Expr(
                self.column_expr(column)
                    .eq(template::with_fallback(&name, &self.ctx.engine.url_path_default)),
            ),
            _ => Condition::Expr(self.column_expr(column).eq(template::required(&name))),
        }
    }
}

/// `url_path` followed by `?url_query` when the query string is non-empty.
pub fn url_fullpath(qualifier: Option<&Qualifier>) -> Expr {
    func(
        "CONCAT",
        vec![
            qualified_col(qualifier, "url_path"),
            func(
                "IFNULL",
                vec![
                    func(
                        "CONCAT",
                        vec![
                            lit_str("?"),
                            func(
                                "NULLIF",
                                vec![qualified_col(qualifier, "url_query"), lit_str("")],
                            ),
                        ],
                    ),
                    lit_str(""),
                ],
            ),
        ],
    )
}

fn comparison_operator(op: &Operator) -> Option<BinaryOperator> {
    match op {
        Operator::Eq => Some(BinaryOperator::Eq),
        Operator::Ne => Some(BinaryOperator::Ne),
        Operator::Gt => Some(BinaryOperator::Gt),
        Operator::Lt => Some(BinaryOperator::Lt),
        Operator::Gte => Some(BinaryOperator::Gte),
        Operator::Lte => Some(BinaryOperator::Lte),
        _ => None,
    }
}

fn contains_pattern(value: &str) -> String {
    if value.contains('%') {
        value.to_string()
    } else {
        format!("%{}%", value)
    }
}

/// Build `target <op> <value(s)>`.
///
/// `value` is the single value; `values` the list used by `IN`/`NOT IN`.
/// A lone `value` also serves as a one-element list, and an `=`/`!=`
/// filter carrying only a list is treated as `IN`/`NOT IN`.
pub fn compare(
    target: Expr,
    column: &str,
    op: &Operator,
    value: Option<&str>,
    values: &[String],
    kind: ValueKind,
) -> Result<Expr, Gap> {
    let list: Vec<&str> = values
        .iter()
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .collect();

    match op {
        Operator::IsNull => Ok(target.is_null()),
        Operator::IsNotNull => Ok(target.is_not_null()),
        Operator::Unsupported(text) => Err(Gap::UnsupportedOperator {
            column: column.to_string(),
            operator: text.clone(),
        }),
        Operator::In | Operator::NotIn => {
            let items: Vec<Expr> = if list.is_empty() {
                value.into_iter().map(|v| kind.literal(v)).collect()
            } else {
                list.iter().map(|v| kind.literal(v)).collect()
            };
            if items.is_empty() {
                return Err(Gap::MissingInList {
                    column: column.to_string(),
                    operator: op.to_string(),
                });
            }
            Ok(if *op == Operator::In {
                target.in_list(items)
            } else {
                target.not_in_list(items)
            })
        }
        _ => {
            let Some(value) = value else {
                if !list.is_empty() && matches!(op, Operator::Eq | Operator::Ne) {
                    let items = list.iter().map(|v| kind.literal(v)).collect();
                    return Ok(if *op == Operator::Eq {
                        target.in_list(items)
                    } else {
                        target.not_in_list(items)
                    });
                }
                return Err(Gap::EmptyFilter {
                    column: column.to_string(),
                });
            };
            Ok(match op {
                Operator::Like => target.like(lit_str(&contains_pattern(value))),
                Operator::NotLike => {
                    target.binary(BinaryOperator::NotLike, lit_str(&contains_pattern(value)))
                }
                Operator::StartsWith => target.like(lit_str(&format!("{}%", value))),
                Operator::EndsWith => target.like(lit_str(&format!("%{}", value))),
                other => match comparison_operator(other) {
                    Some(bin) => target.binary(bin, kind.literal(value)),
                    None => {
                        return Err(Gap::UnsupportedOperator {
                            column: column.to_string(),
                            operator: other.to_string(),
                        })
                    }
                },
            })
        }
    }
}

fn now() -> Expr {
    func("CURRENT_TIMESTAMP", vec![])
}

fn trunc(arg: Expr, unit: &str) -> Expr {
    func("TIMESTAMP_TRUNC", vec![arg, raw_sql(unit)])
}

fn days_ago(days: u32) -> Expr {
    func(
        "TIMESTAMP_SUB",
        vec![now(), raw_sql(&format!("INTERVAL {} DAY", days))],
    )
}

/// Static range for a preset period.
fn date_preset(target: Expr, preset: DateRangeType) -> Vec<Condition> {
    let ge = |bound: Expr| Condition::Expr(target.clone().gte(bound));
    match preset {
        DateRangeType::Today => vec![ge(trunc(now(), "DAY"))],
        DateRangeType::Last7Days => vec![ge(days_ago(7))],
        DateRangeType::Last30Days => vec![ge(days_ago(30))],
        DateRangeType::CurrentMonth => vec![ge(trunc(now(), "MONTH"))],
        DateRangeType::LastMonth => {
            let month_start = trunc(now(), "MONTH");
            let previous = trunc(
                func(
                    "TIMESTAMP_SUB",
                    vec![month_start.clone(), raw_sql("INTERVAL 1 DAY")],
                ),
                "MONTH",
            );
            vec![ge(previous), Condition::Expr(target.clone().lt(month_start))]
        }
        DateRangeType::CurrentYear => vec![ge(trunc(now(), "YEAR"))],
        DateRangeType::Custom => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineSettings, TableSettings};
    use crate::model::ChartConfig;
    use crate::sql::{Dialect, Query};

    fn render(conditions: &[Condition]) -> Vec<String> {
        // Render through a query so Optional lines get their WHERE context.
        conditions
            .iter()
            .map(|c| {
                let sql = Query::new()
                    .filter(crate::sql::col("website_id").eq(lit_str("w1")))
                    .filter(c.clone())
                    .to_sql(Dialect::BigQuery);
                sql.split_once("\n  ").map(|(_, rest)| rest.to_string()).unwrap()
            })
            .collect()
    }

    fn compile_one(filter: Filter) -> (Vec<String>, Diagnostics) {
        let config = ChartConfig::default();
        let tables = TableSettings::default();
        let engine = EngineSettings::default();
        let filters = vec![filter];
        let ctx = PlanContext::new(
            &config,
            &filters,
            &[],
            "w1",
            &tables,
            &engine,
            Dialect::BigQuery,
        );
        let mut diags = Diagnostics::new();
        let conditions = PredicateCompiler::new(&ctx).compile(&filters[0], &mut diags);
        (render(&conditions), diags)
    }

    #[test]
    fn test_text_column_is_quoted_even_if_numeric() {
        let (lines, _) = compile_one(Filter::new("event_name", Operator::Eq, "404"));
        assert_eq!(lines, vec!["AND e.event_name = '404'"]);
    }

    #[test]
    fn test_numeric_value_unquoted() {
        let (lines, _) = compile_one(Filter::new("event_type", Operator::Gt, "1"));
        assert_eq!(lines, vec!["AND e.event_type > 1"]);
    }

    #[test]
    fn test_like_wrapping() {
        let (lines, _) = compile_one(Filter::new("url_path", Operator::Like, "skjema"));
        assert_eq!(lines, vec!["AND e.url_path LIKE '%skjema%'"]);
        let (lines, _) = compile_one(Filter::new("url_path", Operator::NotLike, "/a%"));
        assert_eq!(lines, vec!["AND e.url_path NOT LIKE '/a%'"]);
    }

    #[test]
    fn test_starts_and_ends_with() {
        let (lines, _) = compile_one(Filter::new("url_path", Operator::StartsWith, "/nav"));
        assert_eq!(lines, vec!["AND e.url_path LIKE '/nav%'"]);
        let (lines, _) = compile_one(Filter::new("url_path", Operator::EndsWith, ".pdf"));
        assert_eq!(lines, vec!["AND e.url_path LIKE '%.pdf'"]);
    }

    #[test]
    fn test_session_column_uses_session_alias() {
        let (lines, _) = compile_one(Filter::new("browser", Operator::Eq, "firefox"));
        assert_eq!(lines, vec!["AND s.browser = 'firefox'"]);
    }

    #[test]
    fn test_created_at_custom() {
        let (lines, _) = compile_one(Filter::new("created_at", Operator::Gte, "2024-01-01"));
        assert_eq!(lines, vec!["AND e.created_at >= TIMESTAMP '2024-01-01'"]);
    }

    #[test]
    fn test_created_at_last_month_is_two_lines() {
        let mut filter = Filter::new("created_at", Operator::Gte, "");
        filter.date_range_type = Some(DateRangeType::LastMonth);
        let (lines, _) = compile_one(filter);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("TIMESTAMP_SUB(TIMESTAMP_TRUNC(CURRENT_TIMESTAMP(), MONTH), INTERVAL 1 DAY)"));
        assert_eq!(
            lines[1],
            "AND e.created_at < TIMESTAMP_TRUNC(CURRENT_TIMESTAMP(), MONTH)"
        );
    }

    #[test]
    fn test_empty_value_skipped_with_gap() {
        let (lines, diags) = compile_one(Filter::new("url_path", Operator::Eq, "  "));
        assert!(lines.is_empty());
        assert_eq!(
            diags.iter().next(),
            Some(&Gap::EmptyFilter {
                column: "url_path".into()
            })
        );
    }

    #[test]
    fn test_in_without_values_skipped() {
        let mut filter = Filter::new("event_name", Operator::In, "");
        filter.value = None;
        let (lines, diags) = compile_one(filter);
        assert!(lines.is_empty());
        assert!(matches!(diags.iter().next(), Some(Gap::MissingInList { .. })));
    }

    #[test]
    fn test_param_filter_tests_attribute_column() {
        let config = ChartConfig::default();
        let tables = TableSettings::default();
        let engine = EngineSettings::default();
        let params = vec![
            Parameter::new("skjema.steg", ParameterType::String),
            Parameter::new("kjøp.beløp", ParameterType::Number),
        ];
        let filters = vec![
            Filter::new("param_steg", Operator::Eq, "2"),
            Filter::new("param_beloep", Operator::Gte, "100"),
        ];
        let ctx = PlanContext::new(&config, &filters, &params, "w1", &tables, &engine, Dialect::BigQuery);
        let mut diags = Diagnostics::new();
        let conditions: Vec<Condition> = filters
            .iter()
            .flat_map(|f| PredicateCompiler::new(&ctx).compile(f, &mut diags))
            .collect();
        assert_eq!(
            render(&conditions),
            vec![
                "AND event_data.param_steg = '2'",
                "AND event_data.param_beloep >= 100"
            ]
        );
        assert!(diags.is_empty());

        let bare = PredicateCompiler::bare(&ctx).compile(&filters[0], &mut diags);
        assert!(bare.is_empty());
    }

    #[test]
    fn test_unresolved_param_filter_skipped_with_gap() {
        let (lines, diags) = compile_one(Filter::new("param_skjema", Operator::Eq, "a"));
        assert!(lines.is_empty());
        assert_eq!(
            diags.iter().next(),
            Some(&Gap::UnresolvedParameter {
                reference: "param_skjema".into()
            })
        );
    }

    #[test]
    fn test_url_fullpath_expression() {
        let (lines, _) = compile_one(Filter::new("url_fullpath", Operator::Eq, "/a?b=1"));
        assert_eq!(
            lines,
            vec!["AND CONCAT(e.url_path, IFNULL(CONCAT('?', NULLIF(e.url_query, '')), '')) = '/a?b=1'"]
        );
    }

    #[test]
    fn test_compare_is_null_takes_no_value() {
        let expr = compare(
            crate::sql::col("referrer_domain"),
            "referrer_domain",
            &Operator::IsNull,
            None,
            &[],
            ValueKind::Auto,
        )
        .unwrap();
        assert_eq!(expr.to_sql(Dialect::BigQuery), "referrer_domain IS NULL");
    }
}
