//! Top-level chart configuration.

use serde::{Deserialize, Serialize};

use super::filter::Filter;
use super::metric::Metric;

/// The website whose events are queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A complete chart question as assembled by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default)]
    pub website: Option<Website>,

    /// Filters as stored on the chart. Used when no live filter list is
    /// passed to the compiler.
    #[serde(default)]
    pub filters: Vec<Filter>,

    #[serde(default)]
    pub metrics: Vec<Metric>,

    /// Ordered; drives SELECT, GROUP BY and default ORDER BY.
    #[serde(default)]
    pub group_by_fields: Vec<String>,

    #[serde(default)]
    pub order_by: Option<OrderBy>,

    #[serde(default)]
    pub date_format: DateFormat,

    #[serde(default)]
    pub param_aggregation: ParamAggregation,

    #[serde(default)]
    pub limit: Option<u64>,
}

impl ChartConfig {
    /// Website id, if one is selected and non-blank.
    pub fn website_id(&self) -> Option<&str> {
        self.website
            .as_ref()
            .map(|w| w.id.trim())
            .filter(|id| !id.is_empty())
    }

    /// Whether `created_at` is among the grouping fields.
    pub fn is_date_grouped(&self) -> bool {
        self.group_by_fields
            .iter()
            .any(|f| f.trim() == super::CREATED_AT)
    }
}

/// Explicit ordering chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "ASC")]
    Asc,
    #[default]
    #[serde(alias = "DESC")]
    Desc,
}

/// Granularity used when grouping by `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    Year,
    Month,
    Week,
    #[default]
    Day,
    Hour,
    Minute,
}

/// How a `param_` grouping field is projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamAggregation {
    /// One aggregated value per group (`ANY_VALUE` / `MAX`).
    #[default]
    Representative,
    /// Each distinct string value becomes its own group.
    Unique,
}
