//! Tests for filter compilation through the public planner API.

use chartsql::config::{EngineSettings, TableSettings};
use chartsql::model::{ChartConfig, DateRangeType, Filter, Operator};
use chartsql::planner::predicate::{compare, PredicateCompiler, ValueKind};
use chartsql::planner::{Diagnostics, Gap, PlanContext};
use chartsql::sql::{col, lit_str, Condition, Dialect, ExprExt, Query};

/// Render conditions as the WHERE lines after `website_id = 'w1'`.
fn where_lines(conditions: Vec<Condition>) -> String {
    let sql = Query::new()
        .filter(col("website_id").eq(lit_str("w1")))
        .filters(conditions)
        .to_sql(Dialect::BigQuery);
    sql.split_once("WHERE website_id = 'w1'")
        .map(|(_, rest)| rest.trim_start().to_string())
        .unwrap_or_default()
}

fn compile(filters: &[Filter], bare: bool) -> (String, Diagnostics) {
    let config = ChartConfig::default();
    let tables = TableSettings::default();
    let engine = EngineSettings::default();
    let ctx = PlanContext::new(&config, filters, &[], "w1", &tables, &engine, Dialect::BigQuery);
    let compiler = if bare {
        PredicateCompiler::bare(&ctx)
    } else {
        PredicateCompiler::new(&ctx)
    };
    let mut diags = Diagnostics::new();
    let conditions = filters
        .iter()
        .flat_map(|f| compiler.compile(f, &mut diags))
        .collect();
    (where_lines(conditions), diags)
}

fn template(column: &str, value: &str) -> Filter {
    let mut f = Filter::new(column, Operator::Eq, value);
    f.interactive = true;
    f.metabase_param = true;
    f
}

// ============================================================================
// Literal mode
// ============================================================================

#[test]
fn test_filters_keep_input_order() {
    let filters = vec![
        Filter::new("url_path", Operator::Eq, "/a"),
        Filter::new("country", Operator::Eq, "NO"),
        Filter::new("event_type", Operator::Lt, "3"),
    ];
    let (sql, diags) = compile(&filters, false);
    assert_eq!(
        sql,
        "AND e.url_path = '/a'\n  AND s.country = 'NO'\n  AND e.event_type < 3"
    );
    assert!(diags.is_empty());
}

#[test]
fn test_in_list_and_single_value_fallback() {
    let filters = vec![
        Filter::new("event_name", Operator::In, "").with_values(vec!["a".into(), "b".into()]),
        Filter::new("event_name", Operator::NotIn, "c"),
    ];
    let (sql, _) = compile(&filters, false);
    assert_eq!(
        sql,
        "AND e.event_name IN ('a', 'b')\n  AND e.event_name NOT IN ('c')"
    );
}

#[test]
fn test_equals_with_only_a_list_becomes_in() {
    let mut filter =
        Filter::new("device", Operator::Eq, "").with_values(vec!["mobile".into(), "tablet".into()]);
    filter.value = None;
    let (sql, _) = compile(&[filter], false);
    assert_eq!(sql, "AND s.device IN ('mobile', 'tablet')");
}

#[test]
fn test_unsupported_operator_is_skipped() {
    let filter = Filter::new("url_path", Operator::Unsupported("~".into()), "x");
    let (sql, diags) = compile(&[filter], false);
    assert_eq!(sql, "");
    assert!(matches!(
        diags.iter().next(),
        Some(Gap::UnsupportedOperator { .. })
    ));
}

#[test]
fn test_date_presets() {
    let preset = |range: DateRangeType| {
        let mut f = Filter::new("created_at", Operator::Gte, "");
        f.date_range_type = Some(range);
        compile(&[f], true).0
    };
    assert_eq!(
        preset(DateRangeType::Today),
        "AND created_at >= TIMESTAMP_TRUNC(CURRENT_TIMESTAMP(), DAY)"
    );
    assert_eq!(
        preset(DateRangeType::Last30Days),
        "AND created_at >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 30 DAY)"
    );
    assert_eq!(
        preset(DateRangeType::CurrentYear),
        "AND created_at >= TIMESTAMP_TRUNC(CURRENT_TIMESTAMP(), YEAR)"
    );
}

#[test]
fn test_bucket_definition_is_not_a_predicate() {
    let mut filter = Filter::new("visit_duration", Operator::Gte, "0");
    filter.custom_column = Some(chartsql::model::DurationBuckets(vec![30, 60]));
    let (sql, diags) = compile(&[filter], false);
    assert_eq!(sql, "");
    assert!(diags.is_empty());
}

// ============================================================================
// Interactive mode
// ============================================================================

#[test]
fn test_template_values_are_unquoted() {
    let (sql, _) = compile(&[template("event_name", "{{ hendelse }}")], false);
    assert_eq!(
        sql,
        "AND `analytics-prod.umami.public_website_event`.event_name = {{hendelse}}"
    );
}

#[test]
fn test_template_date_is_optional_clause() {
    let (sql, _) = compile(&[template("created_at", "{{created_at}}")], true);
    assert_eq!(sql, "[[ AND {{created_at}} ]]");
}

#[test]
fn test_template_url_path_has_fallback() {
    let (sql, _) = compile(&[template("url_path", "")], true);
    assert_eq!(sql, "AND url_path = [[ {{url_path}} --]] '/'");
}

// ============================================================================
// compare()
// ============================================================================

#[test]
fn test_compare_value_kinds() {
    let render = |kind: ValueKind, value: &str| {
        compare(col("x"), "x", &Operator::Eq, Some(value), &[], kind)
            .unwrap()
            .to_sql(Dialect::BigQuery)
    };
    assert_eq!(render(ValueKind::Auto, "12.5"), "x = 12.5");
    assert_eq!(render(ValueKind::Auto, "12a"), "x = '12a'");
    assert_eq!(render(ValueKind::Text, "12"), "x = '12'");
    assert_eq!(
        render(ValueKind::Timestamp, "2024-05-01"),
        "x = TIMESTAMP '2024-05-01'"
    );
}

#[test]
fn test_compare_missing_value() {
    let gap = compare(col("x"), "x", &Operator::Gt, None, &[], ValueKind::Auto).unwrap_err();
    assert_eq!(gap, Gap::EmptyFilter { column: "x".into() });
}
