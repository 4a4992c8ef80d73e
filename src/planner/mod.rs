//! Query planner - turns a chart configuration into a SQL query.
//!
//! Pipeline:
//! 1. Mode decision: interactive (BI tool templates) or literal
//! 2. CTE selection: `visit_counts`, `visit_metrics` or none, the attribute
//!    CTE when parameters are referenced, then `base_query`
//! 3. Predicate folding into `base_query`
//! 4. Outer SELECT / per-parameter joins / GROUP BY / ORDER BY / LIMIT
//!
//! Each step is a pure function of the inputs; nothing is cached between calls.

pub mod assemble;
pub mod columns;
pub mod gap;
pub mod metric;
pub mod predicate;
pub mod template;

pub use assemble::assemble;
pub use gap::{Diagnostics, Gap, GapLevel};

use crate::config::{EngineSettings, TableKind, TableSettings};
use crate::model::{ChartConfig, Filter, MetricKind, Parameter};
use crate::sql::{AliasStyle, Dialect, Qualifier};

/// Name of the CTE every outer reference goes through.
pub const BASE_QUERY: &str = "base_query";

/// Per-event attribute CTE: one row per event, one column per referenced
/// parameter.
pub const ATTRIBUTES: &str = "event_data";

/// `base_query` flag marking the first remaining row of each visit.
pub const FIRST_IN_VISIT: &str = "first_in_visit";

/// Per-visit CTE feeding visit-level metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitCte {
    /// `visit_counts`: events per visit, for bounce rate.
    Counts,
    /// `visit_metrics`: first-event time and duration per visit.
    Metrics,
    None,
}

impl VisitCte {
    /// Branch selection in priority order.
    pub fn select(config: &ChartConfig, filters: &[Filter]) -> Self {
        if config
            .metrics
            .iter()
            .any(|m| matches!(m.kind, MetricKind::BounceRate))
        {
            VisitCte::Counts
        } else if columns::needs_visit_duration(config, filters) {
            VisitCte::Metrics
        } else {
            VisitCte::None
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        match self {
            VisitCte::Counts => Some("visit_counts"),
            VisitCte::Metrics => Some("visit_metrics"),
            VisitCte::None => None,
        }
    }

    fn short_alias(&self) -> Option<&'static str> {
        match self {
            VisitCte::Counts => Some("vc"),
            VisitCte::Metrics => Some("vm"),
            VisitCte::None => None,
        }
    }
}

/// Everything one compilation reads, plus the two decisions every
/// component depends on (mode and CTE branch).
#[derive(Debug, Clone)]
pub struct PlanContext<'a> {
    pub config: &'a ChartConfig,
    pub filters: &'a [Filter],
    pub parameters: &'a [Parameter],
    pub website_id: &'a str,
    pub tables: &'a TableSettings,
    pub engine: &'a EngineSettings,
    pub dialect: Dialect,
    /// Any filter is a BI tool template. Table references then use full
    /// table paths, since the tool's field filters expand to them.
    pub interactive: bool,
    pub visit_cte: VisitCte,
}

impl<'a> PlanContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a ChartConfig,
        filters: &'a [Filter],
        parameters: &'a [Parameter],
        website_id: &'a str,
        tables: &'a TableSettings,
        engine: &'a EngineSettings,
        dialect: Dialect,
    ) -> Self {
        Self {
            config,
            filters,
            parameters,
            website_id,
            tables,
            engine,
            dialect,
            interactive: filters.iter().any(Filter::is_template),
            visit_cte: VisitCte::select(config, filters),
        }
    }

    pub fn table(&self, kind: TableKind) -> String {
        self.tables.qualified(kind)
    }

    /// Alias given to the events table in `base_query`, if any.
    pub fn event_alias(&self) -> Option<&'static str> {
        (!self.interactive).then_some("e")
    }

    /// Alias given to the sessions table in `base_query`, if any.
    pub fn session_alias(&self) -> Option<&'static str> {
        (!self.interactive).then_some("s")
    }

    /// Alias given to the visit CTE in `base_query`, if any.
    pub fn visit_alias(&self) -> Option<&'static str> {
        if self.interactive {
            None
        } else {
            self.visit_cte.short_alias()
        }
    }

    pub fn event_qualifier(&self) -> Qualifier {
        match self.event_alias() {
            Some(alias) => Qualifier::alias(alias),
            None => Qualifier::table(&self.table(TableKind::Events)),
        }
    }

    pub fn session_qualifier(&self) -> Qualifier {
        match self.session_alias() {
            Some(alias) => Qualifier::alias(alias),
            None => Qualifier::table(&self.table(TableKind::Sessions)),
        }
    }

    /// Qualifier for columns of the visit CTE. Falls back to the events
    /// table when no visit CTE was selected.
    pub fn visit_qualifier(&self) -> Qualifier {
        match (self.visit_alias(), self.visit_cte.name()) {
            (Some(alias), _) => Qualifier::alias(alias),
            (None, Some(name)) => Qualifier::alias(name),
            (None, None) => self.event_qualifier(),
        }
    }

    pub fn base_qualifier(&self) -> Qualifier {
        Qualifier::alias(BASE_QUERY)
    }

    pub fn attributes_qualifier(&self) -> Qualifier {
        Qualifier::alias(ATTRIBUTES)
    }

    /// Metric aliases are quoted, except in interactive mode.
    pub fn alias_style(&self) -> AliasStyle {
        if self.interactive {
            AliasStyle::Bare
        } else {
            AliasStyle::Quoted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metric, Operator};

    fn ctx<'a>(
        config: &'a ChartConfig,
        filters: &'a [Filter],
        tables: &'a TableSettings,
        engine: &'a EngineSettings,
    ) -> PlanContext<'a> {
        PlanContext::new(config, filters, &[], "w1", tables, engine, Dialect::BigQuery)
    }

    #[test]
    fn test_literal_mode_uses_short_aliases() {
        let (config, tables, engine) = (
            ChartConfig::default(),
            TableSettings::default(),
            EngineSettings::default(),
        );
        let c = ctx(&config, &[], &tables, &engine);
        assert!(!c.interactive);
        assert_eq!(c.event_qualifier(), Qualifier::alias("e"));
        assert_eq!(c.session_qualifier(), Qualifier::alias("s"));
        assert_eq!(c.alias_style(), AliasStyle::Quoted);
    }

    #[test]
    fn test_interactive_mode_uses_table_paths() {
        let (config, tables, engine) = (
            ChartConfig::default(),
            TableSettings::default(),
            EngineSettings::default(),
        );
        let mut f = Filter::new("event_name", Operator::Eq, "{{event_name}}");
        f.interactive = true;
        f.metabase_param = true;
        let filters = vec![f];
        let c = ctx(&config, &filters, &tables, &engine);
        assert!(c.interactive);
        assert_eq!(
            c.event_qualifier(),
            Qualifier::table("analytics-prod.umami.public_website_event")
        );
        assert_eq!(c.alias_style(), AliasStyle::Bare);
    }

    #[test]
    fn test_interactive_needs_both_flags() {
        let mut f = Filter::new("event_name", Operator::Eq, "{{event_name}}");
        f.interactive = true;
        assert!(!f.is_template());
    }

    #[test]
    fn test_visit_cte_priority() {
        let mut config = ChartConfig {
            metrics: vec![Metric::new(MetricKind::Average {
                column: Some("visit_duration".into()),
                show_in_minutes: false,
            })],
            ..Default::default()
        };
        assert_eq!(VisitCte::select(&config, &[]), VisitCte::Metrics);

        config.metrics.push(Metric::new(MetricKind::BounceRate));
        assert_eq!(VisitCte::select(&config, &[]), VisitCte::Counts);

        assert_eq!(VisitCte::select(&ChartConfig::default(), &[]), VisitCte::None);
    }
}
