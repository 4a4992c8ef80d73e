//! Query assembly - CTE selection, joins, outer SELECT, GROUP BY, ORDER BY.

use std::collections::HashSet;

use tracing::debug;

use crate::config::TableKind;
use crate::model::{
    ChartConfig, MetricKind, Parameter, ParamAggregation, ParameterType, SortDirection,
    CREATED_AT, VISIT_DURATION,
};
use crate::sql::{
    any_value, case_when, col, count_star, func, ident, lit_int, lit_str, max, min,
    qualified_col, qualified_star, raw_sql, row_number, table_col, AliasStyle, Condition, Cte,
    Expr, ExprExt, OrderByExpr, Query, SelectExpr, SqlDialect, TableRef,
};

use super::columns::{
    is_param_reference, param_column, references, required_session_columns, required_tables,
    resolve_parameter, sanitize_identifier, URL_FULLPATH,
};
use super::gap::{Diagnostics, Gap};
use super::metric::{default_alias, CompiledMetric, MetricCompiler};
use super::predicate::{url_fullpath, PredicateCompiler};
use super::{PlanContext, VisitCte, ATTRIBUTES, BASE_QUERY, FIRST_IN_VISIT};

/// Alias of the formatted `created_at` projection.
pub const DATE_ALIAS: &str = "dato";

/// Alias of the bucketed `visit_duration` projection.
pub const BUCKET_ALIAS: &str = "visit_duration_bucket";

/// Build the full query for a chart.
pub fn assemble(ctx: &PlanContext<'_>, diags: &mut Diagnostics) -> Query {
    debug!(
        website_id = ctx.website_id,
        interactive = ctx.interactive,
        visit_cte = ?ctx.visit_cte,
        "assembling chart query"
    );

    if ctx.interactive && ctx.visit_cte != VisitCte::None {
        diags.push(Gap::InteractiveVisitMetrics);
    }

    let grouping = Grouping::build(ctx, diags);
    let params = attribute_parameters(ctx, &grouping);

    let mut query = Query::new();
    if let Some(cte) = visit_cte(ctx) {
        query = query.with_cte(cte);
    }
    if let Some(cte) = attribute_cte(ctx, &params) {
        query = query.with_cte(cte);
    }
    query = query.with_cte(Cte::new(BASE_QUERY, base_query(ctx, &params, diags)));

    let metrics = MetricCompiler::new(ctx).compile_all(diags);

    let mut select: Vec<SelectExpr> = grouping.select.clone();
    select.extend(metrics.iter().map(|m| m.select.clone()));
    if select.is_empty() {
        select.push(SelectExpr::new(qualified_star(Some(&ctx.base_qualifier()))));
    }

    query = query.select(select).from(TableRef::cte(BASE_QUERY));

    for (param, join_alias) in &grouping.direct_joins {
        let mut on = attribute_join_on(ctx, join_alias);
        on.push(table_col(join_alias, "data_key").eq(lit_str(param.name())));
        query = query.left_join(
            TableRef::new(&ctx.table(TableKind::EventData)).with_alias(join_alias),
            on,
        );
    }

    query = query
        .group_by(grouping.group_by.clone())
        .order_by(vec![order_by(ctx, &grouping, &metrics)]);

    if let Some(limit) = ctx.config.limit.filter(|&n| n > 0) {
        query = query.limit(limit);
    }

    query
}

// =============================================================================
// CTEs
// =============================================================================

/// `CASE WHEN COUNT(*) = 1 THEN 0 ELSE TIMESTAMP_DIFF(MAX(created_at), MIN(created_at), SECOND) END`
fn visit_duration_seconds() -> Expr {
    Expr::Case {
        when_clauses: vec![(count_star().eq(lit_int(1)), lit_int(0))],
        else_clause: Some(Box::new(func(
            "TIMESTAMP_DIFF",
            vec![max(col(CREATED_AT)), min(col(CREATED_AT)), raw_sql("SECOND")],
        ))),
    }
}

/// Static date filters (or the optional date template) for single-table
/// queries over the events table.
fn date_conditions(ctx: &PlanContext<'_>) -> Vec<Condition> {
    let compiler = PredicateCompiler::bare(ctx);
    let mut scratch = Diagnostics::new();
    ctx.filters
        .iter()
        .filter(|f| f.column.trim() == CREATED_AT)
        .flat_map(|f| compiler.compile(f, &mut scratch))
        .collect()
}

fn visit_cte(ctx: &PlanContext<'_>) -> Option<Cte> {
    let name = ctx.visit_cte.name()?;
    let needs_duration = references(ctx.config, ctx.filters, VISIT_DURATION);

    let mut select: Vec<SelectExpr> = vec![col("visit_id").into()];
    if ctx.visit_cte == VisitCte::Counts {
        select.push(count_star().alias("events_in_visit"));
    }
    if ctx.visit_cte == VisitCte::Metrics || needs_duration {
        select.push(min(col(CREATED_AT)).alias("visit_start"));
        select.push(visit_duration_seconds().alias(VISIT_DURATION));
    }

    let query = Query::new()
        .select(select)
        .from(TableRef::new(&ctx.table(TableKind::Events)))
        .filter(col("website_id").eq(lit_str(ctx.website_id)))
        .filters(date_conditions(ctx))
        .group_by(vec![col("visit_id")]);

    Some(Cte::new(name, query))
}

fn table_ref(path: &str, alias: Option<&str>) -> TableRef {
    let table = TableRef::new(path);
    match alias {
        Some(alias) => table.with_alias(alias),
        None => table,
    }
}

/// Whether a sum, average or median is taken over visit durations.
fn measures_visit_duration(config: &ChartConfig) -> bool {
    config.metrics.iter().any(|m| {
        matches!(
            m.kind,
            MetricKind::Sum { .. } | MetricKind::Average { .. } | MetricKind::Median { .. }
        ) && m.kind.column() == Some(VISIT_DURATION)
    })
}

/// One row per event carrying a column per parameter, so that joining it
/// neither multiplies events nor hides one parameter behind another's filter.
fn attribute_cte(ctx: &PlanContext<'_>, params: &[&Parameter]) -> Option<Cte> {
    if params.is_empty() {
        return None;
    }

    let mut select: Vec<SelectExpr> = vec![col("website_event_id").into(), col(CREATED_AT).into()];
    for param in params {
        let value = case_when(
            col("data_key").eq(lit_str(param.name())),
            col(param.param_type.value_column()),
        );
        select.push(max(value).alias(&param_column(param)));
    }
    let keys = params.iter().map(|p| lit_str(p.name())).collect();

    let query = Query::new()
        .select(select)
        .from(TableRef::new(&ctx.table(TableKind::EventData)))
        .filter(col("website_id").eq(lit_str(ctx.website_id)))
        .filter(col("data_key").in_list(keys))
        .filters(date_conditions(ctx))
        .group_by(vec![col("website_event_id"), col(CREATED_AT)]);

    Some(Cte::new(ATTRIBUTES, query))
}

fn base_query(ctx: &PlanContext<'_>, params: &[&Parameter], diags: &mut Diagnostics) -> Query {
    let events = ctx.event_qualifier();
    let attrs = ctx.attributes_qualifier();
    let sessions = ctx.session_qualifier();
    let visits = ctx.visit_qualifier();
    let needs_duration = references(ctx.config, ctx.filters, VISIT_DURATION);

    let mut select: Vec<SelectExpr> = vec![qualified_star(Some(&events)).into()];
    let visit_columns: &[&str] = match ctx.visit_cte {
        VisitCte::Counts if needs_duration => &["events_in_visit", "visit_start", VISIT_DURATION],
        VisitCte::Counts => &["events_in_visit"],
        VisitCte::Metrics => &["visit_start", VISIT_DURATION],
        VisitCte::None => &[],
    };
    for column in visit_columns {
        select.push(qualified_col(Some(&visits), column).into());
    }
    if visit_columns.contains(&VISIT_DURATION) && measures_visit_duration(ctx.config) {
        // Ranked after filtering, so the flag marks a row that survived it.
        let rank = row_number().over(
            vec![qualified_col(Some(&events), "visit_id")],
            vec![
                qualified_col(Some(&events), CREATED_AT),
                qualified_col(Some(&events), "event_id"),
            ],
        );
        select.push(rank.eq(lit_int(1)).alias(FIRST_IN_VISIT));
    }
    if references(ctx.config, ctx.filters, URL_FULLPATH) {
        select.push(url_fullpath(Some(&events)).alias(URL_FULLPATH));
    }
    for column in required_session_columns(ctx.config, ctx.filters) {
        select.push(qualified_col(Some(&sessions), column).into());
    }
    for param in params {
        select.push(qualified_col(Some(&attrs), &param_column(param)).into());
    }

    let mut query = Query::new()
        .select(select)
        .from(table_ref(&ctx.table(TableKind::Events), ctx.event_alias()));

    if let Some(name) = ctx.visit_cte.name() {
        let mut cte = TableRef::cte(name);
        if let Some(alias) = ctx.visit_alias() {
            cte = cte.with_alias(alias);
        }
        query = query.left_join(
            cte,
            vec![qualified_col(Some(&events), "visit_id").eq(qualified_col(Some(&visits), "visit_id"))],
        );
    }

    if required_tables(ctx.config, ctx.filters).session {
        query = query.left_join(
            table_ref(&ctx.table(TableKind::Sessions), ctx.session_alias()),
            vec![qualified_col(Some(&events), "session_id")
                .eq(qualified_col(Some(&sessions), "session_id"))],
        );
    }

    if !params.is_empty() {
        query = query.left_join(
            TableRef::cte(ATTRIBUTES),
            vec![
                qualified_col(Some(&events), "event_id")
                    .eq(qualified_col(Some(&attrs), "website_event_id")),
                qualified_col(Some(&attrs), CREATED_AT)
                    .eq(qualified_col(Some(&events), CREATED_AT)),
            ],
        );
    }

    let compiler = PredicateCompiler::new(ctx);
    query = query.filter(qualified_col(Some(&events), "website_id").eq(lit_str(ctx.website_id)));
    for filter in ctx.filters {
        query = query.filters(compiler.compile(filter, diags));
    }

    query
}

// =============================================================================
// Outer SELECT
// =============================================================================

/// Projections derived from `groupByFields`.
#[derive(Debug, Default)]
struct Grouping<'a> {
    select: Vec<SelectExpr>,
    group_by: Vec<Expr>,
    /// Names a user ordering may refer to, with the expression to order by.
    order_keys: Vec<(String, Expr)>,
    /// Parameters selected through their own attribute join.
    direct_joins: Vec<(&'a Parameter, String)>,
}

impl<'a> Grouping<'a> {
    fn build(ctx: &PlanContext<'a>, diags: &mut Diagnostics) -> Self {
        let mut grouping = Grouping::default();
        let mut seen: HashSet<String> = HashSet::new();
        let base = ctx.base_qualifier();

        for field in ctx.config.group_by_fields.iter().map(|f| f.trim()) {
            if field.is_empty() {
                continue;
            }

            // (projection, GROUP BY expression if not aggregated, ORDER BY expression)
            let (projection, group, order, direct) = if field == CREATED_AT {
                let format = ctx.dialect.timestamp_format(ctx.config.date_format);
                let expr = func(
                    ctx.dialect.format_timestamp_function(),
                    vec![lit_str(format), qualified_col(Some(&base), CREATED_AT)],
                );
                (expr.alias(DATE_ALIAS), Some(col(DATE_ALIAS)), col(DATE_ALIAS), None)
            } else if field == VISIT_DURATION {
                match duration_buckets(ctx) {
                    Some(case) => (
                        case.alias(BUCKET_ALIAS),
                        Some(col(BUCKET_ALIAS)),
                        col(BUCKET_ALIAS),
                        None,
                    ),
                    None => {
                        let expr = qualified_col(Some(&base), VISIT_DURATION);
                        (SelectExpr::new(expr.clone()), Some(expr.clone()), expr, None)
                    }
                }
            } else if is_param_reference(field) {
                let Some(param) = resolve_parameter(ctx.parameters, field) else {
                    diags.push(Gap::UnresolvedParameter {
                        reference: field.to_string(),
                    });
                    continue;
                };
                let alias = sanitize_identifier(field);
                if ctx.config.param_aggregation == ParamAggregation::Unique
                    && param.param_type == ParameterType::String
                {
                    let join_alias = format!("{}_data", alias);
                    let expr = table_col(&join_alias, param.param_type.value_column());
                    (
                        expr.alias(&alias),
                        Some(col(&alias)),
                        col(&alias),
                        Some((param, join_alias)),
                    )
                } else {
                    let value = table_col(BASE_QUERY, &param_column(param));
                    let expr = match param.param_type {
                        ParameterType::String => any_value(value),
                        ParameterType::Number => max(value),
                    };
                    (expr.alias(&alias), None, col(&alias), None)
                }
            } else {
                let expr = qualified_col(Some(&base), &sanitize_identifier(field));
                (SelectExpr::new(expr.clone()), Some(expr.clone()), expr, None)
            };

            if !seen.insert(projection.to_tokens(ctx.dialect).serialize(ctx.dialect)) {
                continue;
            }
            grouping.select.push(projection);
            if let Some(group) = group {
                grouping.group_by.push(group);
            }
            grouping.order_keys.push((field.to_string(), order));
            if let Some(direct) = direct {
                grouping.direct_joins.push(direct);
            }
        }

        grouping
    }

    /// ORDER BY expression for a user-chosen column, if it names a grouping.
    fn order_key(&self, column: &str) -> Option<Expr> {
        let column = if column == DATE_ALIAS { CREATED_AT } else { column };
        self.order_keys
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, expr)| expr.clone())
    }
}

/// Bucket expression from the first `visit_duration` filter carrying
/// bucket boundaries.
fn duration_buckets(ctx: &PlanContext<'_>) -> Option<Expr> {
    let boundaries = ctx
        .filters
        .iter()
        .filter(|f| f.column.trim() == VISIT_DURATION)
        .find_map(|f| f.custom_column.as_ref())?
        .boundaries();
    let last = *boundaries.last()?;

    let duration = table_col(BASE_QUERY, VISIT_DURATION);
    let mut lower = 0;
    let when_clauses = boundaries
        .iter()
        .map(|&upper| {
            let label = format!("{}-{}s", lower, upper);
            lower = upper;
            (duration.clone().lt(lit_int(upper)), lit_str(&label))
        })
        .collect();

    Some(Expr::Case {
        when_clauses,
        else_clause: Some(Box::new(lit_str(&format!("{}s+", last)))),
    })
}

// =============================================================================
// Attribute joins
// =============================================================================

/// Parameters carried by the attribute CTE, in first-seen order. Grouping
/// fields with their own join are left out. Unresolved references were
/// reported where they are used.
fn attribute_parameters<'a>(ctx: &PlanContext<'a>, grouping: &Grouping<'a>) -> Vec<&'a Parameter> {
    let direct = |p: &Parameter| grouping.direct_joins.iter().any(|(d, _)| std::ptr::eq(*d, p));
    let mut out: Vec<&Parameter> = Vec::new();

    let grouped = ctx.config.group_by_fields.iter().map(|f| (f.trim(), true));
    let filtered = ctx.filters.iter().map(|f| (f.column.trim(), false));
    let measured = ctx
        .config
        .metrics
        .iter()
        .filter_map(|m| m.kind.column())
        .map(|c| (c, false));

    for (reference, is_group) in grouped.chain(filtered).chain(measured) {
        if !is_param_reference(reference) {
            continue;
        }
        let Some(param) = resolve_parameter(ctx.parameters, reference) else {
            continue;
        };
        if is_group && direct(param) {
            continue;
        }
        if !out.iter().any(|p| std::ptr::eq(*p, param)) {
            out.push(param);
        }
    }
    out
}

/// Event id, website id and created_at match between `base_query` and a
/// per-parameter join. The created_at match lets the warehouse prune
/// partitions.
fn attribute_join_on(ctx: &PlanContext<'_>, alias: &str) -> Vec<Expr> {
    vec![
        table_col(BASE_QUERY, "event_id").eq(table_col(alias, "website_event_id")),
        table_col(alias, "website_id").eq(lit_str(ctx.website_id)),
        table_col(alias, CREATED_AT).eq(table_col(BASE_QUERY, CREATED_AT)),
    ]
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Reference to a metric alias, quoted the same way as in SELECT.
fn metric_ref(ctx: &PlanContext<'_>, metric: &CompiledMetric) -> Expr {
    match ctx.alias_style() {
        AliasStyle::Quoted => ident(&metric.alias),
        AliasStyle::Bare => col(&metric.alias),
    }
}

/// Metric a user ordering refers to: its alias, its default `metrikk_<n>`
/// name, or the legacy `andel` / `andel_<n>` names of unaliased
/// `percentage` metrics.
fn find_metric<'m>(metrics: &'m [CompiledMetric], column: &str) -> Option<&'m CompiledMetric> {
    if let Some(m) = metrics.iter().find(|m| {
        m.alias == column
            || m.user_alias.as_deref() == Some(column)
            || default_alias(m.index) == column
    }) {
        return Some(m);
    }

    let unaliased_percentage =
        |m: &&CompiledMetric| m.kind == "percentage" && m.user_alias.is_none();
    if column == "andel" {
        return metrics.iter().find(unaliased_percentage);
    }
    let index: usize = column.strip_prefix("andel_")?.parse().ok()?;
    metrics
        .iter()
        .filter(unaliased_percentage)
        .find(|m| m.index == index)
}

fn fallback_order(ctx: &PlanContext<'_>) -> OrderByExpr {
    if ctx.config.is_date_grouped() {
        OrderByExpr::asc(col(DATE_ALIAS))
    } else {
        OrderByExpr::desc(lit_int(1))
    }
}

fn order_by(ctx: &PlanContext<'_>, grouping: &Grouping<'_>, metrics: &[CompiledMetric]) -> OrderByExpr {
    let Some(order) = ctx.config.order_by.as_ref() else {
        if ctx.config.is_date_grouped() {
            return OrderByExpr::asc(col(DATE_ALIAS));
        }
        return match metrics.first() {
            Some(first) => OrderByExpr::desc(metric_ref(ctx, first)),
            None => OrderByExpr::desc(lit_int(1)),
        };
    };

    let column = order.column.trim();
    let target = grouping
        .order_key(column)
        .or_else(|| find_metric(metrics, column).map(|m| metric_ref(ctx, m)));

    match target {
        Some(expr) => match order.direction {
            SortDirection::Asc => OrderByExpr::asc(expr),
            SortDirection::Desc => OrderByExpr::desc(expr),
        },
        None => {
            debug!(column, "ORDER BY column matches nothing, using fallback");
            fallback_order(ctx)
        }
    }
}
