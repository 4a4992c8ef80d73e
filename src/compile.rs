//! End-to-end compilation from a chart configuration to SQL.
//!
//! ```text
//! ChartConfig + Filter[] + Parameter[] → PlanContext → Query → SQL
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chartsql::compile::{compile_chart, CompileOptions};
//! use chartsql::model::{ChartConfig, Metric, MetricKind, Website};
//!
//! let config = ChartConfig {
//!     website: Some(Website { id: "w1".into(), name: None }),
//!     group_by_fields: vec!["url_path".into()],
//!     metrics: vec![Metric::new(MetricKind::Count)],
//!     ..Default::default()
//! };
//!
//! let output = compile_chart(&config, &[], &[], &CompileOptions::default());
//! println!("{}", output.sql);
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::{EngineSettings, Settings, TableSettings};
use crate::model::{ChartConfig, Filter, Parameter};
use crate::planner::{self, Diagnostics, Gap, PlanContext};
use crate::sql::Dialect;

/// Output when the chart has no website selected.
pub const PLACEHOLDER_SQL: &str = "-- Velg en nettside for å generere SQL";

// ============================================================================
// Error Types
// ============================================================================

/// Errors reading a chart request. Compilation itself cannot fail.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Failed to read request: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,
    pub tables: TableSettings,
    pub engine: EngineSettings,
}

impl CompileOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dialect: Dialect::default(),
            tables: settings.tables.clone(),
            engine: settings.engine.clone(),
        }
    }

    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

// ============================================================================
// Request / Result Types
// ============================================================================

/// A chart as the UI layer sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartRequest {
    pub config: ChartConfig,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl ChartRequest {
    pub fn from_json(content: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, RequestError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn compile(&self, options: &CompileOptions) -> CompileOutput {
        compile_chart(&self.config, &self.filters, &self.parameters, options)
    }
}

/// Result of compiling a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// The generated SQL string.
    pub sql: String,

    /// Inputs that were skipped or replaced by a fallback, in the order met.
    pub diagnostics: Vec<Gap>,

    /// Whether the SQL carries BI tool template variables.
    pub interactive: bool,
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Compile a chart to SQL.
///
/// `filters` is the live filter state and wins when non-empty; otherwise the
/// filters saved on the chart are used.
pub fn compile_chart(
    config: &ChartConfig,
    filters: &[Filter],
    parameters: &[Parameter],
    options: &CompileOptions,
) -> CompileOutput {
    let Some(website_id) = config.website_id() else {
        tracing::debug!("no website selected");
        return CompileOutput {
            sql: PLACEHOLDER_SQL.to_string(),
            diagnostics: vec![],
            interactive: false,
        };
    };

    let filters = if filters.is_empty() {
        config.filters.as_slice()
    } else {
        filters
    };

    let ctx = PlanContext::new(
        config,
        filters,
        parameters,
        website_id,
        &options.tables,
        &options.engine,
        options.dialect,
    );
    let mut diags = Diagnostics::new();
    let query = planner::assemble(&ctx, &mut diags);

    CompileOutput {
        sql: query.to_sql(options.dialect),
        diagnostics: diags.into_vec(),
        interactive: ctx.interactive,
    }
}

/// Compile a chart and return only the SQL text.
pub fn compile_chart_sql(
    config: &ChartConfig,
    filters: &[Filter],
    parameters: &[Parameter],
    options: &CompileOptions,
) -> String {
    compile_chart(config, filters, parameters, options).sql
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metric, MetricKind, Operator, Website};

    fn chart(website: Option<&str>) -> ChartConfig {
        ChartConfig {
            website: website.map(|id| Website {
                id: id.to_string(),
                name: None,
            }),
            group_by_fields: vec!["url_path".into()],
            metrics: vec![Metric::new(MetricKind::Count)],
            ..Default::default()
        }
    }

    #[test]
    fn test_placeholder_without_website() {
        let output = compile_chart(&chart(None), &[], &[], &CompileOptions::default());
        assert_eq!(output.sql, PLACEHOLDER_SQL);
        assert!(!output.interactive);

        let output = compile_chart(&chart(Some("  ")), &[], &[], &CompileOptions::default());
        assert_eq!(output.sql, PLACEHOLDER_SQL);
    }

    #[test]
    fn test_compile_simple_chart() {
        let output = compile_chart(&chart(Some("w1")), &[], &[], &CompileOptions::default());
        assert!(output.sql.starts_with("WITH base_query AS ("));
        assert!(output.sql.contains("e.website_id = 'w1'"));
        assert!(output.diagnostics.is_empty());
        assert!(!output.interactive);
    }

    #[test]
    fn test_explicit_filters_win_over_config() {
        let mut config = chart(Some("w1"));
        config.filters = vec![Filter::new("event_name", Operator::Eq, "saved")];
        let live = vec![Filter::new("event_name", Operator::Eq, "live")];
        let sql = compile_chart_sql(&config, &live, &[], &CompileOptions::default());
        assert!(sql.contains("AND e.event_name = 'live'"));
        assert!(!sql.contains("saved"));
    }

    #[test]
    fn test_config_filters_used_when_none_passed() {
        let mut config = chart(Some("w1"));
        config.filters = vec![Filter::new("event_name", Operator::Eq, "saved")];
        let sql = compile_chart_sql(&config, &[], &[], &CompileOptions::default());
        assert!(sql.contains("AND e.event_name = 'saved'"));
    }

    #[test]
    fn test_table_settings_flow_through() {
        let mut options = CompileOptions::default();
        options.tables.project = "other-project".into();
        let sql = compile_chart_sql(&chart(Some("w1")), &[], &[], &options);
        assert!(sql.contains("`other-project.umami.public_website_event`"));
    }

    #[test]
    fn test_request_from_json() {
        let request = ChartRequest::from_json(
            r#"{
                "config": {
                    "website": { "id": "w1" },
                    "groupByFields": ["url_path"],
                    "metrics": [{ "function": "count" }]
                },
                "filters": [{ "column": "event_name", "operator": "=", "value": "404" }]
            }"#,
        )
        .unwrap();
        assert!(request.parameters.is_empty());
        let output = request.compile(&CompileOptions::default());
        assert!(output.sql.contains("AND e.event_name = '404'"));
    }

    #[test]
    fn test_request_rejects_bad_json() {
        assert!(matches!(
            ChartRequest::from_json("{"),
            Err(RequestError::Json(_))
        ));
    }
}
