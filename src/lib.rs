//! # chartsql
//!
//! Compiles a declarative chart configuration over web-analytics event data
//! into a single BigQuery SQL statement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │     ChartConfig + Filter[] + Parameter[] (JSON/serde)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner: mode + CTE branch]
//! ┌─────────────────────────────────────────────────────────┐
//! │   visit CTE → base_query → outer SELECT / joins / ORDER  │
//! │   (columns, predicate, metric, template, assemble)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql: Query → TokenStream]
//! ┌─────────────────────────────────────────────────────────┐
//! │          SQL text (+ diagnostics, interactive flag)      │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod compile;
pub mod config;
pub mod model;
pub mod planner;
pub mod sql;

pub use compile::{
    compile_chart, compile_chart_sql, ChartRequest, CompileOptions, CompileOutput, RequestError,
};
pub use model::{
    ChartConfig, DateFormat, Filter, Metric, MetricKind, Operator, Parameter, ParameterType,
};
pub use planner::{Gap, GapLevel};
pub use sql::Dialect;
