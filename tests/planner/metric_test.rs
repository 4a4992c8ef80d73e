//! Tests for metric compilation.

use chartsql::config::{EngineSettings, TableSettings};
use chartsql::model::{
    ChartConfig, Filter, Metric, MetricKind, Operator, Parameter, ParameterType,
};
use chartsql::planner::metric::MetricCompiler;
use chartsql::planner::{Diagnostics, Gap, PlanContext};
use chartsql::sql::Dialect;

fn compile_with(
    metrics: Vec<Metric>,
    filters: &[Filter],
    params: &[Parameter],
) -> (Vec<String>, Vec<Gap>) {
    let config = ChartConfig {
        metrics,
        ..Default::default()
    };
    let tables = TableSettings::default();
    let engine = EngineSettings::default();
    let ctx = PlanContext::new(&config, filters, params, "w1", &tables, &engine, Dialect::BigQuery);
    let mut diags = Diagnostics::new();
    let compiled = MetricCompiler::new(&ctx).compile_all(&mut diags);
    let sql = compiled
        .iter()
        .map(|m| m.select.to_tokens(Dialect::BigQuery).serialize(Dialect::BigQuery))
        .collect();
    (sql, diags.into_vec())
}

fn compile_one(kind: MetricKind) -> String {
    compile_with(vec![Metric::new(kind)], &[], &[]).0.remove(0)
}

#[test]
fn test_simple_aggregates() {
    assert_eq!(compile_one(MetricKind::Count), "COUNT(*) AS `metrikk_1`");
    assert_eq!(
        compile_one(MetricKind::Distinct { column: None }),
        "COUNT(DISTINCT base_query.session_id) AS `metrikk_1`"
    );
    assert_eq!(
        compile_one(MetricKind::Sum {
            column: Some("event_type".into()),
            show_in_minutes: false,
        }),
        "SUM(base_query.event_type) AS `metrikk_1`"
    );
    assert_eq!(
        compile_one(MetricKind::Max {
            column: Some("created_at".into()),
        }),
        "MAX(base_query.created_at) AS `metrikk_1`"
    );
}

#[test]
fn test_median_uses_approx_quantiles() {
    assert_eq!(
        compile_one(MetricKind::Median {
            column: Some("event_type".into()),
            show_in_minutes: false,
        }),
        "APPROX_QUANTILES(base_query.event_type, 2)[OFFSET(1)] AS `metrikk_1`"
    );
}

#[test]
fn test_visit_duration_counts_each_visit_once() {
    let per_visit = "CASE WHEN base_query.first_in_visit THEN base_query.visit_duration END";
    assert_eq!(
        compile_one(MetricKind::Sum {
            column: Some("visit_duration".into()),
            show_in_minutes: true,
        }),
        format!("ROUND(SUM({}) / 60, 1) AS `metrikk_1`", per_visit)
    );
    assert_eq!(
        compile_one(MetricKind::Average {
            column: Some("visit_duration".into()),
            show_in_minutes: false,
        }),
        format!("SUM({0}) / NULLIF(COUNT({0}), 0) AS `metrikk_1`", per_visit)
    );
}

#[test]
fn test_percentage_of_all_rows() {
    assert_eq!(
        compile_one(MetricKind::Percentage {
            column: Some("alle_rader_prosent".into()),
        }),
        "ROUND(100 * COUNT(*) / NULLIF(SUM(COUNT(*)) OVER(), 0), 1) AS `metrikk_1`"
    );
}

#[test]
fn test_bounce_rate() {
    assert_eq!(
        compile_one(MetricKind::BounceRate),
        "ROUND(100 * COUNT(DISTINCT CASE WHEN base_query.events_in_visit = 1 THEN base_query.visit_id END) \
         / NULLIF(COUNT(DISTINCT base_query.visit_id), 0), 1) AS `metrikk_1`"
    );
}

#[test]
fn test_count_where_on_event_column() {
    let sql = compile_one(MetricKind::CountWhere {
        where_column: Some("event_name".into()),
        where_operator: Some(Operator::In),
        where_value: None,
        where_multiple_values: vec!["a".into(), "b".into()],
    });
    assert_eq!(
        sql,
        "COUNT(CASE WHEN base_query.event_name IN ('a', 'b') THEN 1 END) AS `metrikk_1`"
    );
}

#[test]
fn test_count_where_on_parameter() {
    let params = vec![Parameter::new("kjøp.beløp", ParameterType::Number)];
    let (sql, gaps) = compile_with(
        vec![Metric::new(MetricKind::CountWhere {
            where_column: Some("param_beloep".into()),
            where_operator: Some(Operator::Gt),
            where_value: Some("100".into()),
            where_multiple_values: vec![],
        })],
        &[],
        &params,
    );
    assert!(gaps.is_empty());
    assert_eq!(
        sql[0],
        "COUNT(CASE WHEN base_query.param_beloep > 100 THEN 1 END) AS `metrikk_1`"
    );
}

#[test]
fn test_count_where_without_condition_falls_back() {
    let (sql, gaps) = compile_with(
        vec![Metric::new(MetricKind::CountWhere {
            where_column: Some("event_name".into()),
            where_operator: Some(Operator::Eq),
            where_value: Some(" ".into()),
            where_multiple_values: vec![],
        })],
        &[],
        &[],
    );
    assert!(sql[0].starts_with("COUNT(*) AS `metrikk_1` /* "));
    assert_eq!(gaps, vec![Gap::IncompleteCountWhere { index: 1 }]);
}

#[test]
fn test_andel_on_parameter_uses_attribute_universe() {
    let params = vec![Parameter::new("skjema.steg", ParameterType::String)];
    let filters = vec![
        Filter::new("created_at", Operator::Gte, "2024-01-01"),
        Filter::new("url_path", Operator::Eq, "/skjema"),
    ];
    let (sql, _) = compile_with(
        vec![Metric::new(MetricKind::Andel {
            column: Some("param_steg".into()),
        })],
        &filters,
        &params,
    );
    assert!(sql[0].starts_with("ROUND(100 * COUNT(DISTINCT base_query.param_steg) / NULLIF((SELECT"));
    assert!(sql[0].contains(
        "(SELECT\n  COUNT(DISTINCT string_value)\nFROM `analytics-prod.umami.public_event_data`\n\
         WHERE website_id = 'w1'\n  AND data_key = 'steg'\n  AND created_at >= TIMESTAMP '2024-01-01')"
    ));
    // Only date filters reach the attribute universe.
    assert!(!sql[0].contains("/skjema"));
}

#[test]
fn test_andel_on_session_column_counts_sessions() {
    let filters = vec![Filter::new("browser", Operator::Eq, "firefox")];
    let (sql, _) = compile_with(
        vec![Metric::new(MetricKind::Andel {
            column: Some("browser".into()),
        })],
        &filters,
        &[],
    );
    assert!(sql[0].starts_with("ROUND(100 * COUNT(DISTINCT base_query.session_id) / NULLIF((SELECT\n  COUNT(DISTINCT session_id)"));
    // Session filters cannot be applied to the events table.
    assert!(!sql[0].contains("firefox"));
}

#[test]
fn test_interactive_aliases_are_bare() {
    let mut filter = Filter::new("event_name", Operator::Eq, "{{event_name}}");
    filter.interactive = true;
    filter.metabase_param = true;
    let (sql, _) = compile_with(
        vec![Metric::new(MetricKind::Count).with_alias("Antall")],
        &[filter],
        &[],
    );
    assert_eq!(sql[0], "COUNT(*) AS Antall");
}
