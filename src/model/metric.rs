//! Metric definitions.

use serde::{Deserialize, Serialize};

use super::filter::Operator;
use super::loose;

/// One aggregate column of the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(flatten)]
    pub kind: MetricKind,
}

impl Metric {
    pub fn new(kind: MetricKind) -> Self {
        Self { alias: None, kind }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Non-blank user alias.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref().filter(|a| !a.trim().is_empty())
    }
}

/// Aggregate kind, tagged by `function` in JSON.
///
/// Each variant carries exactly the fields its SQL shape needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MetricKind {
    /// `COUNT(*)`
    Count,
    /// Distinct count of a column (default: the session id).
    Distinct {
        #[serde(default)]
        column: Option<String>,
    },
    Sum {
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        show_in_minutes: bool,
    },
    Average {
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        show_in_minutes: bool,
    },
    Median {
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        show_in_minutes: bool,
    },
    Min {
        #[serde(default)]
        column: Option<String>,
    },
    Max {
        #[serde(default)]
        column: Option<String>,
    },
    /// Share of the window total of the filtered result set.
    Percentage {
        #[serde(default)]
        column: Option<String>,
    },
    /// Share of an independently scoped denominator.
    Andel {
        #[serde(default)]
        column: Option<String>,
    },
    BounceRate,
    /// Conditional count. Every field is optional so that a half-configured
    /// metric still decodes and degrades to an inert expression.
    CountWhere {
        #[serde(default)]
        where_column: Option<String>,
        #[serde(default)]
        where_operator: Option<Operator>,
        #[serde(default, deserialize_with = "loose::opt_string")]
        where_value: Option<String>,
        #[serde(default, deserialize_with = "loose::string_list")]
        where_multiple_values: Vec<String>,
    },
}

impl MetricKind {
    /// The `function` name as the UI spells it.
    pub fn function_name(&self) -> &'static str {
        match self {
            MetricKind::Count => "count",
            MetricKind::Distinct { .. } => "distinct",
            MetricKind::Sum { .. } => "sum",
            MetricKind::Average { .. } => "average",
            MetricKind::Median { .. } => "median",
            MetricKind::Min { .. } => "min",
            MetricKind::Max { .. } => "max",
            MetricKind::Percentage { .. } => "percentage",
            MetricKind::Andel { .. } => "andel",
            MetricKind::BounceRate => "bounce_rate",
            MetricKind::CountWhere { .. } => "count_where",
        }
    }

    /// The column this metric aggregates, if any (non-blank).
    pub fn column(&self) -> Option<&str> {
        let column = match self {
            MetricKind::Distinct { column }
            | MetricKind::Sum { column, .. }
            | MetricKind::Average { column, .. }
            | MetricKind::Median { column, .. }
            | MetricKind::Min { column }
            | MetricKind::Max { column }
            | MetricKind::Percentage { column }
            | MetricKind::Andel { column } => column.as_deref(),
            MetricKind::CountWhere { where_column, .. } => where_column.as_deref(),
            MetricKind::Count | MetricKind::BounceRate => None,
        };
        column.map(str::trim).filter(|c| !c.is_empty())
    }
}
