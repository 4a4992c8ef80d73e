//! Filter definitions.

use serde::{Deserialize, Serialize};

use super::loose;

/// One user filter.
///
/// When `interactive && metabase_param`, `value` holds a `{{name}}`
/// placeholder for the BI tool rather than a literal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub column: String,

    #[serde(default)]
    pub operator: Operator,

    #[serde(default, deserialize_with = "loose::opt_string")]
    pub value: Option<String>,

    #[serde(default, deserialize_with = "loose::string_list")]
    pub multiple_values: Vec<String>,

    #[serde(default)]
    pub interactive: bool,

    #[serde(default)]
    pub metabase_param: bool,

    /// Bucket boundaries for a `visit_duration` grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_column: Option<DurationBuckets>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range_type: Option<DateRangeType>,
}

impl Filter {
    /// Shorthand for a plain `column operator value` filter.
    pub fn new(column: &str, operator: Operator, value: &str) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Set the list used by `IN` / `NOT IN`.
    pub fn with_values(mut self, values: Vec<String>) -> Self {
        self.multiple_values = values;
        self
    }

    /// A filter the BI tool fills in at view time.
    pub fn is_template(&self) -> bool {
        self.interactive && self.metabase_param
    }

    /// Non-blank value, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// Comparison operator of a filter or `count_where` metric.
///
/// Unknown operator strings are kept as `Unsupported` so the planner can
/// skip them with a diagnostic instead of failing to decode the chart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    NotLike,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Unsupported(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Unsupported(s) => s,
        }
    }

    /// Operators that take no value.
    pub fn is_nullary(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// Operators that take a value list.
    pub fn is_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        match s.trim().to_uppercase().as_str() {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Gte,
            "<=" => Operator::Lte,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "STARTS_WITH" => Operator::StartsWith,
            "ENDS_WITH" => Operator::EndsWith,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "IS NULL" => Operator::IsNull,
            "IS NOT NULL" => Operator::IsNotNull,
            _ => Operator::Unsupported(s),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preset date ranges offered by the period picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DateRangeType {
    /// Explicit bounds carried by `operator`/`value`.
    #[default]
    Custom,
    Today,
    Last7Days,
    Last30Days,
    CurrentMonth,
    LastMonth,
    CurrentYear,
}

impl DateRangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateRangeType::Custom => "custom",
            DateRangeType::Today => "today",
            DateRangeType::Last7Days => "last_7_days",
            DateRangeType::Last30Days => "last_30_days",
            DateRangeType::CurrentMonth => "current_month",
            DateRangeType::LastMonth => "last_month",
            DateRangeType::CurrentYear => "current_year",
        }
    }
}

impl From<String> for DateRangeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "today" => DateRangeType::Today,
            "last_7_days" => DateRangeType::Last7Days,
            "last_30_days" => DateRangeType::Last30Days,
            "current_month" => DateRangeType::CurrentMonth,
            "last_month" => DateRangeType::LastMonth,
            "current_year" => DateRangeType::CurrentYear,
            _ => DateRangeType::Custom,
        }
    }
}

impl From<DateRangeType> for String {
    fn from(d: DateRangeType) -> Self {
        d.as_str().to_string()
    }
}

/// Ascending bucket boundaries, in seconds, for grouping visit durations.
///
/// `[10, 60]` yields the buckets `0-10s`, `10-60s` and `60s+`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationBuckets(pub Vec<u64>);

impl DurationBuckets {
    /// Boundaries sorted and deduplicated. Zero and values outside the
    /// INT64 range are dropped.
    pub fn boundaries(&self) -> Vec<i64> {
        let mut b: Vec<i64> = self
            .0
            .iter()
            .filter_map(|&s| i64::try_from(s).ok())
            .filter(|&s| s > 0)
            .collect();
        b.sort_unstable();
        b.dedup();
        b
    }
}
