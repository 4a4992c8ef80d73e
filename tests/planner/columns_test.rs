//! Tests for column classification, sanitization and parameter resolution.

use chartsql::model::{ChartConfig, Filter, Metric, MetricKind, Operator, Parameter, ParameterType};
use chartsql::planner::columns::{
    is_param_reference, referenced_columns, required_session_columns, resolve_parameter,
    sanitize_alias, sanitize_identifier,
};

#[test]
fn test_sanitize_is_idempotent_for_awkward_keys() {
    let keys = [
        "1.kjøp",
        "Søknad.Steg",
        "ÆØÅ.æøå",
        "...",
        "a b-c/d",
        "___",
        "42",
        "skjema.v2.felt",
        "émoji🙂",
    ];
    for key in keys {
        let once = sanitize_identifier(key);
        assert_eq!(sanitize_identifier(&once), once, "key {:?}", key);
        assert!(
            once.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "{:?} -> {:?}",
            key,
            once
        );
        assert!(!once.starts_with(|c: char| c.is_ascii_digit()));
    }
    assert_eq!(sanitize_identifier("1.kjøp"), "_1_kjoep");
    assert_eq!(sanitize_identifier("Søknad.Steg"), "Soeknad_Steg");
}

#[test]
fn test_alias_sanitizing_falls_back_to_default() {
    assert_eq!(sanitize_alias("  ", "metrikk_2"), "metrikk_2");
    assert_eq!(sanitize_alias("Sidevisninger", "metrikk_1"), "Sidevisninger");
    assert_eq!(sanitize_alias("7 dager", "metrikk_1"), "_7_dager");
}

#[test]
fn test_param_prefix() {
    assert!(is_param_reference("param_steg"));
    assert!(!is_param_reference("steg"));
    assert!(!is_param_reference("params"));
}

#[test]
fn test_parameter_resolution_uses_sanitized_names() {
    let params = vec![
        Parameter::new("skjema.Søknad steg", ParameterType::String),
        Parameter::new("kjøp.antall", ParameterType::Number),
    ];
    let found = resolve_parameter(&params, "param_Soeknad_steg").unwrap();
    assert_eq!(found.name(), "Søknad steg");
    assert_eq!(found.param_type.value_column(), "string_value");

    let found = resolve_parameter(&params, "param_antall").unwrap();
    assert_eq!(found.param_type.value_column(), "number_value");
}

#[test]
fn test_ambiguous_parameters_take_first_match() {
    let params = vec![
        Parameter::new("a.kjøp", ParameterType::Number),
        Parameter::new("b.kjoep", ParameterType::String),
    ];
    let found = resolve_parameter(&params, "param_kjoep").unwrap();
    assert_eq!(found.key, "a.kjøp");
}

#[test]
fn test_referenced_columns_first_seen_order() {
    let config = ChartConfig {
        group_by_fields: vec!["url_path".into(), "".into(), "browser".into()],
        metrics: vec![
            Metric::new(MetricKind::Distinct {
                column: Some("session_id".into()),
            }),
            Metric::new(MetricKind::Count),
            Metric::new(MetricKind::Max {
                column: Some("url_path".into()),
            }),
        ],
        ..Default::default()
    };
    let filters = vec![
        Filter::new("country", Operator::Eq, "NO"),
        Filter::new("browser", Operator::Ne, "ie"),
    ];
    assert_eq!(
        referenced_columns(&config, &filters),
        vec!["url_path", "browser", "country", "session_id"]
    );
    assert_eq!(
        required_session_columns(&config, &filters),
        vec!["browser", "country"]
    );
}
