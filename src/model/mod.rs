//! Chart configuration model.
//!
//! These are the value types the UI layer produces and the planner reads.
//! JSON field names are camelCase to match what the UI serializes.

pub mod chart;
pub mod filter;
pub mod metric;
pub mod parameter;

mod loose;

pub use chart::{ChartConfig, DateFormat, OrderBy, ParamAggregation, SortDirection, Website};
pub use filter::{DateRangeType, DurationBuckets, Filter, Operator};
pub use metric::{Metric, MetricKind};
pub use parameter::{Parameter, ParameterType};

/// Session-table columns. Everything else lives on the event table.
pub const SESSION_COLUMNS: [&str; 8] = [
    "browser",
    "os",
    "device",
    "screen",
    "language",
    "country",
    "subdivision1",
    "city",
];

/// Prefix marking a reference to a per-event attribute.
pub const PARAM_PREFIX: &str = "param_";

/// Column holding the event timestamp; grouping by it yields `dato`.
pub const CREATED_AT: &str = "created_at";

/// Derived per-visit duration column.
pub const VISIT_DURATION: &str = "visit_duration";
