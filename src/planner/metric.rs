//! Metric compilation - one metric to one aggregate SELECT item.

use crate::config::TableKind;
use crate::model::{Metric, MetricKind, Operator, Parameter, VISIT_DURATION};
use crate::sql::{
    avg, case_when, col, count, count_distinct, count_star, lit_int, lit_str, max, median, min,
    nullif, round, sum, table_col, Condition, Expr, ExprExt, Query, SelectExpr, TableRef,
};

use super::columns::{
    is_param_reference, is_session_column, param_column, resolve_parameter, sanitize_alias,
    sanitize_identifier, URL_FULLPATH,
};
use super::gap::{Diagnostics, Gap};
use super::predicate::{compare, url_fullpath, PredicateCompiler, ValueKind};
use super::{PlanContext, BASE_QUERY, FIRST_IN_VISIT};

/// `percentage` over every row instead of a distinct count.
pub const ALL_ROWS_PERCENTAGE: &str = "alle_rader_prosent";

/// A metric ready for the outer SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledMetric {
    /// 1-based position in the chart.
    pub index: usize,
    /// Final, unique alias.
    pub alias: String,
    /// The alias as the user typed it, if any.
    pub user_alias: Option<String>,
    pub kind: &'static str,
    pub select: SelectExpr,
}

pub fn default_alias(index: usize) -> String {
    format!("metrikk_{}", index)
}

/// Assign each metric a unique alias.
///
/// User aliases are sanitized; unaliased metrics get `metrikk_<n>`.
/// Aliases are compared case-insensitively, as the warehouse does, and a
/// repeat gets a `_<n>` suffix.
pub fn assign_aliases(metrics: &[Metric], diags: &mut Diagnostics) -> Vec<String> {
    let mut used: Vec<String> = Vec::with_capacity(metrics.len());
    for (i, metric) in metrics.iter().enumerate() {
        let default = default_alias(i + 1);
        let wanted = match metric.alias() {
            Some(alias) => sanitize_alias(alias, &default),
            None => default,
        };
        let mut alias = wanted.clone();
        let mut n = 2;
        while used.iter().any(|u| u.eq_ignore_ascii_case(&alias)) {
            alias = format!("{}_{}", wanted, n);
            n += 1;
        }
        if alias != wanted {
            diags.push(Gap::AliasCollision {
                alias: wanted,
                renamed: alias.clone(),
            });
        }
        used.push(alias);
    }
    used
}

/// Compiles metrics against `base_query`.
pub struct MetricCompiler<'a> {
    ctx: &'a PlanContext<'a>,
}

impl<'a> MetricCompiler<'a> {
    pub fn new(ctx: &'a PlanContext<'a>) -> Self {
        Self { ctx }
    }

    /// Compile every metric of the chart, in order.
    pub fn compile_all(&self, diags: &mut Diagnostics) -> Vec<CompiledMetric> {
        let metrics = &self.ctx.config.metrics;
        let aliases = assign_aliases(metrics, diags);
        metrics
            .iter()
            .zip(aliases)
            .enumerate()
            .map(|(i, (metric, alias))| self.compile(metric, i + 1, alias, diags))
            .collect()
    }

    /// Compile one metric. Never fails: an uncompilable metric becomes
    /// `COUNT(*)` with a comment naming the gap.
    pub fn compile(
        &self,
        metric: &Metric,
        index: usize,
        alias: String,
        diags: &mut Diagnostics,
    ) -> CompiledMetric {
        let style = self.ctx.alias_style();
        let select = match self.expression(&metric.kind, index) {
            Ok(expr) => SelectExpr::new(expr)
                .with_alias(&alias)
                .with_alias_style(style),
            Err(gap) => {
                let note = gap.to_string();
                diags.push(gap);
                SelectExpr::new(count_star())
                    .with_alias(&alias)
                    .with_alias_style(style)
                    .with_comment(&note)
            }
        };
        CompiledMetric {
            index,
            alias,
            user_alias: metric.alias().map(str::to_string),
            kind: metric.kind.function_name(),
            select,
        }
    }

    fn base(&self, column: &str) -> Expr {
        table_col(BASE_QUERY, &sanitize_identifier(column))
    }

    fn session_column(&self) -> &str {
        &self.ctx.engine.default_session_column
    }

    fn param_value(&self, param: &Parameter) -> Expr {
        self.base(&param_column(param))
    }

    fn resolve(&self, column: &str) -> Result<&'a Parameter, Gap> {
        resolve_parameter(self.ctx.parameters, column).ok_or_else(|| Gap::UnresolvedParameter {
            reference: column.to_string(),
        })
    }

    /// The per-row value a metric aggregates.
    fn measured(&self, column: &str) -> Result<Expr, Gap> {
        if is_param_reference(column) {
            Ok(self.param_value(self.resolve(column)?))
        } else {
            Ok(self.base(column))
        }
    }

    /// Visit duration on the first `base_query` row of each visit only, so
    /// that every visit left after filtering is counted once.
    fn first_event_duration(&self) -> Expr {
        case_when(self.base(FIRST_IN_VISIT), self.base(VISIT_DURATION))
    }

    fn expression(&self, kind: &MetricKind, index: usize) -> Result<Expr, Gap> {
        let missing = || Gap::MissingColumn {
            index,
            function: kind.function_name(),
        };

        Ok(match kind {
            MetricKind::Count => count_star(),

            MetricKind::Distinct { .. } => {
                let column = kind.column().unwrap_or(self.session_column());
                count_distinct(self.measured(column)?)
            }

            MetricKind::Sum {
                show_in_minutes, ..
            }
            | MetricKind::Average {
                show_in_minutes, ..
            }
            | MetricKind::Median {
                show_in_minutes, ..
            } => {
                let column = kind.column().ok_or_else(missing)?;
                if column == VISIT_DURATION {
                    let per_visit = self.first_event_duration();
                    let expr = match kind {
                        MetricKind::Sum { .. } => sum(per_visit),
                        MetricKind::Median { .. } => median(per_visit),
                        _ => sum(per_visit.clone())
                            .div(nullif(count(per_visit), lit_int(0))),
                    };
                    if *show_in_minutes {
                        round(expr.div(lit_int(60)), 1)
                    } else {
                        expr
                    }
                } else {
                    let value = self.measured(column)?;
                    match kind {
                        MetricKind::Sum { .. } => sum(value),
                        MetricKind::Median { .. } => median(value),
                        _ => avg(value),
                    }
                }
            }

            MetricKind::Min { .. } => min(self.measured(kind.column().ok_or_else(missing)?)?),
            MetricKind::Max { .. } => max(self.measured(kind.column().ok_or_else(missing)?)?),

            MetricKind::Percentage { .. } => {
                let column = kind.column().unwrap_or(self.session_column());
                let counted = if column == ALL_ROWS_PERCENTAGE {
                    count_star()
                } else {
                    count_distinct(self.measured(column)?)
                };
                percent(counted.clone(), sum(counted).over_all())
            }

            MetricKind::Andel { .. } => self.andel(kind.column())?,

            MetricKind::BounceRate => {
                let single_event_visits = count_distinct(case_when(
                    self.base("events_in_visit").eq(lit_int(1)),
                    self.base("visit_id"),
                ));
                percent(single_event_visits, count_distinct(self.base("visit_id")))
            }

            MetricKind::CountWhere {
                where_column,
                where_operator,
                where_value,
                where_multiple_values,
            } => {
                let incomplete = || Gap::IncompleteCountWhere { index };
                let column = where_column
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(incomplete)?;
                let op = where_operator.clone().unwrap_or_default();
                let value = where_value.as_deref().filter(|v| !v.trim().is_empty());
                let has_list = where_multiple_values.iter().any(|v| !v.trim().is_empty());
                if !op.is_nullary() && value.is_none() && !has_list {
                    return Err(incomplete());
                }
                let condition =
                    self.count_where_condition(column, &op, value, where_multiple_values)?;
                count(case_when(condition, lit_int(1)))
            }
        })
    }

    fn count_where_condition(
        &self,
        column: &str,
        op: &Operator,
        value: Option<&str>,
        values: &[String],
    ) -> Result<Expr, Gap> {
        if is_param_reference(column) {
            let param = self.resolve(column)?;
            compare(
                self.param_value(param),
                column,
                op,
                value,
                values,
                ValueKind::for_parameter(param),
            )
        } else {
            compare(
                self.base(column),
                column,
                op,
                value,
                values,
                ValueKind::for_column(column),
            )
        }
    }

    /// Share of an independent universe: the same website and event-level
    /// filters, without session, visit or attribute scoping. Session-scoped
    /// and visit-scoped columns are measured in sessions.
    fn andel(&self, column: Option<&str>) -> Result<Expr, Gap> {
        let website = col("website_id").eq(lit_str(self.ctx.website_id));

        let (numerator, denominator) = match column {
            Some(column) if is_param_reference(column) => {
                let param = self.resolve(column)?;
                let value_column = param.param_type.value_column();
                let universe = Query::new()
                    .select(vec![count_distinct(col(value_column))])
                    .from(TableRef::new(&self.ctx.table(TableKind::EventData)))
                    .filter(website)
                    .filter(col("data_key").eq(lit_str(param.name())))
                    .filters(self.universe_conditions(true));
                (count_distinct(self.param_value(param)), universe)
            }
            Some(column) if !is_session_column(column) && column != VISIT_DURATION => {
                let target = if column == URL_FULLPATH {
                    url_fullpath(None)
                } else {
                    col(&sanitize_identifier(column))
                };
                let universe = Query::new()
                    .select(vec![count_distinct(target)])
                    .from(TableRef::new(&self.ctx.table(TableKind::Events)))
                    .filter(website)
                    .filters(self.universe_conditions(false));
                (count_distinct(self.base(column)), universe)
            }
            _ => {
                let session = sanitize_identifier(self.session_column());
                let universe = Query::new()
                    .select(vec![count_distinct(col(&session))])
                    .from(TableRef::new(&self.ctx.table(TableKind::Events)))
                    .filter(website)
                    .filters(self.universe_conditions(false));
                (count_distinct(self.base(&session)), universe)
            }
        };

        Ok(percent(numerator, denominator.into()))
    }

    /// Filters that can be applied to a single-table denominator query.
    fn universe_conditions(&self, dates_only: bool) -> Vec<Condition> {
        let compiler = PredicateCompiler::bare(self.ctx);
        // Gaps were already reported by the base_query pass.
        let mut scratch = Diagnostics::new();
        self.ctx
            .filters
            .iter()
            .filter(|f| {
                let column = f.column.trim();
                if dates_only {
                    column == crate::model::CREATED_AT
                } else {
                    !is_session_column(column)
                        && !is_param_reference(column)
                        && column != VISIT_DURATION
                }
            })
            .flat_map(|f| compiler.compile(f, &mut scratch))
            .collect()
    }
}

/// `ROUND(100 * part / NULLIF(whole, 0), 1)`
fn percent(part: Expr, whole: Expr) -> Expr {
    round(lit_int(100).mul(part).div(nullif(whole, lit_int(0))), 1)
}
