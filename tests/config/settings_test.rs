//! Tests for loading settings from disk and feeding them to the compiler.

use std::env;
use std::fs;
use std::path::PathBuf;

use chartsql::compile::{compile_chart_sql, CompileOptions};
use chartsql::config::{Settings, SettingsError, TableKind};
use chartsql::model::{ChartConfig, Metric, MetricKind, Website};

fn write_config(name: &str, content: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("chartsql-settings-test-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_from_file() {
    let path = write_config(
        "basic.toml",
        r#"
[tables]
project = "team-analytics"
dataset = "umami_eu"
"#,
    );
    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(
        settings.tables.qualified(TableKind::Events),
        "team-analytics.umami_eu.public_website_event"
    );
    assert_eq!(
        settings.tables.qualified(TableKind::EventData),
        "team-analytics.umami_eu.public_event_data"
    );
    assert_eq!(settings.engine.url_path_default, "/");
}

#[test]
fn test_missing_file() {
    let result = Settings::from_file("/definitely/not/here/chartsql.toml");
    assert!(matches!(result, Err(SettingsError::FileNotFound(_))));
}

#[test]
fn test_invalid_toml() {
    let path = write_config("broken.toml", "[tables\nproject = 1");
    assert!(matches!(
        Settings::from_file(&path),
        Err(SettingsError::ParseError(_))
    ));
}

#[test]
fn test_full_table_paths_skip_project() {
    let settings = Settings::from_toml(
        r#"
[tables]
project = ""
dataset = ""
events = "p.d.events"
sessions = "p.d.sessions"
event_data = "p.d.event_data"
"#,
    )
    .unwrap();
    assert_eq!(settings.tables.qualified(TableKind::Sessions), "p.d.sessions");
}

#[test]
fn test_empty_table_name_rejected() {
    let result = Settings::from_toml("[tables]\nsessions = \"  \"\n");
    assert!(matches!(result, Err(SettingsError::InvalidConfig(msg)) if msg.contains("sessions")));
}

#[test]
fn test_env_expansion_in_file() {
    env::set_var("CHARTSQL_SETTINGS_TEST_PROJECT", "from-env");
    let path = write_config(
        "env.toml",
        "[tables]\nproject = \"${CHARTSQL_SETTINGS_TEST_PROJECT}\"\n",
    );
    let settings = Settings::from_file(&path).unwrap();
    env::remove_var("CHARTSQL_SETTINGS_TEST_PROJECT");
    assert_eq!(settings.tables.project, "from-env");
}

#[test]
fn test_settings_reach_generated_sql() {
    let settings = Settings::from_toml(
        r#"
[tables]
project = "team-analytics"
dataset = "umami_eu"

[engine]
default_session_column = "visit_id"
"#,
    )
    .unwrap();
    let config = ChartConfig {
        website: Some(Website {
            id: "w1".into(),
            name: None,
        }),
        metrics: vec![Metric::new(MetricKind::Distinct { column: None })],
        ..Default::default()
    };
    let sql = compile_chart_sql(&config, &[], &[], &CompileOptions::from_settings(&settings));
    assert!(sql.contains("FROM `team-analytics.umami_eu.public_website_event` AS e"));
    assert!(sql.contains("COUNT(DISTINCT base_query.visit_id) AS `metrikk_1`"));
}
