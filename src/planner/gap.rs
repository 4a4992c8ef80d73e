//! Diagnostics for partially configured charts.
//!
//! The planner never fails on a structurally valid chart. Anything it has to
//! skip or replace is recorded here so the caller can explain the output.

use serde::Serialize;

/// A local, recoverable problem found while planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Gap {
    #[error("filter on `{column}` has no value and was skipped")]
    EmptyFilter { column: String },

    #[error("filter on `{column}` uses {operator} without any values and was skipped")]
    MissingInList { column: String, operator: String },

    #[error("operator `{operator}` is not supported on `{column}`; filter skipped")]
    UnsupportedOperator { column: String, operator: String },

    #[error("`{reference}` does not match any known parameter")]
    UnresolvedParameter { reference: String },

    #[error("metric {index} (count_where) is missing its column or value; counting all rows")]
    IncompleteCountWhere { index: usize },

    #[error("metric {index} ({function}) has no column; counting all rows")]
    MissingColumn {
        index: usize,
        function: &'static str,
    },

    #[error("alias `{alias}` is used more than once; renamed to `{renamed}`")]
    AliasCollision { alias: String, renamed: String },

    #[error("interactive filters are combined with visit-level metrics; the BI tool may not apply them to the visit CTE")]
    InteractiveVisitMetrics,
}

/// How a gap affected the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapLevel {
    /// Something was left out of the query.
    Skipped,
    /// Something was replaced by an inert expression.
    Fallback,
    /// The query is complete but may not behave as intended downstream.
    Advisory,
}

impl Gap {
    pub fn level(&self) -> GapLevel {
        match self {
            Gap::EmptyFilter { .. }
            | Gap::MissingInList { .. }
            | Gap::UnsupportedOperator { .. }
            | Gap::UnresolvedParameter { .. } => GapLevel::Skipped,
            Gap::IncompleteCountWhere { .. } | Gap::MissingColumn { .. } => GapLevel::Fallback,
            Gap::AliasCollision { .. } | Gap::InteractiveVisitMetrics => GapLevel::Advisory,
        }
    }
}

/// Ordered collection of gaps for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    gaps: Vec<Gap>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a gap and log it.
    pub fn push(&mut self, gap: Gap) {
        match gap.level() {
            GapLevel::Skipped => tracing::debug!(%gap, "skipped"),
            GapLevel::Fallback | GapLevel::Advisory => tracing::warn!(%gap, "degraded output"),
        }
        if !self.gaps.contains(&gap) {
            self.gaps.push(gap);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gap> {
        self.gaps.iter()
    }

    pub fn into_vec(self) -> Vec<Gap> {
        self.gaps
    }
}
