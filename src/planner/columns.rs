//! Column classification and identifier sanitization.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{
    ChartConfig, Filter, Parameter, PARAM_PREFIX, SESSION_COLUMNS, VISIT_DURATION,
};

/// Synthesized column: `url_path` plus `?url_query` when present.
pub const URL_FULLPATH: &str = "url_fullpath";

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());

/// True iff `name` lives on the session table.
pub fn is_session_column(name: &str) -> bool {
    SESSION_COLUMNS.contains(&name)
}

/// True iff `name` refers to a per-event attribute (`param_<x>`).
pub fn is_param_reference(name: &str) -> bool {
    name.starts_with(PARAM_PREFIX)
}

/// Columns whose values are always text, even when they look numeric.
pub fn is_text_column(name: &str) -> bool {
    name == "event_name"
        || name == "url_path"
        || name.contains("_path")
        || name.contains("_name")
        || is_session_column(name)
}

/// A bare decimal number that can be emitted unquoted.
pub fn is_numeric(value: &str) -> bool {
    NUMERIC.is_match(value)
}

/// Map an arbitrary key to a valid identifier.
///
/// `.` becomes `_`, the Nordic vowels are transliterated (æ→ae, ø→oe,
/// å→aa, case-insensitively), any other non-word character becomes `_`,
/// and a leading digit gets a `_` prefix. Idempotent.
pub fn sanitize_identifier(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            'æ' | 'Æ' => out.push_str("ae"),
            'ø' | 'Ø' => out.push_str("oe"),
            'å' | 'Å' => out.push_str("aa"),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            _ => out.push('_'),
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Map a user alias to a valid identifier, or `default` if nothing remains.
pub fn sanitize_alias(alias: &str, default: &str) -> String {
    let mut out: String = alias
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.trim_matches('_').is_empty() {
        return default.to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Resolve `param_<x>` to the first parameter whose sanitized name is `x`.
pub fn resolve_parameter<'p>(parameters: &'p [Parameter], reference: &str) -> Option<&'p Parameter> {
    let wanted = sanitize_identifier(reference.strip_prefix(PARAM_PREFIX)?);
    parameters
        .iter()
        .find(|p| sanitize_identifier(p.name()) == wanted)
}

/// Column holding a parameter's value in the per-event attribute CTE.
pub fn param_column(param: &Parameter) -> String {
    format!("{}{}", PARAM_PREFIX, sanitize_identifier(param.name()))
}

/// Every column name the chart mentions, in first-seen order: grouping
/// fields, then filter columns, then metric columns.
pub fn referenced_columns<'a>(config: &'a ChartConfig, filters: &'a [Filter]) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    let candidates = config
        .group_by_fields
        .iter()
        .map(String::as_str)
        .chain(filters.iter().map(|f| f.column.trim()))
        .chain(config.metrics.iter().filter_map(|m| m.kind.column()));
    for name in candidates {
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Session columns the chart needs, in canonical order.
pub fn required_session_columns(config: &ChartConfig, filters: &[Filter]) -> Vec<&'static str> {
    let referenced = referenced_columns(config, filters);
    SESSION_COLUMNS
        .iter()
        .copied()
        .filter(|c| referenced.contains(c))
        .collect()
}

/// Which side tables the chart needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredTables {
    pub session: bool,
    /// Always true. The assembler joins the attribute table only when a
    /// `param_` reference exists.
    pub attributes: bool,
}

pub fn required_tables(config: &ChartConfig, filters: &[Filter]) -> RequiredTables {
    RequiredTables {
        session: !required_session_columns(config, filters).is_empty(),
        attributes: true,
    }
}

/// Whether any grouping, filter or metric refers to `column`.
pub fn references(config: &ChartConfig, filters: &[Filter], column: &str) -> bool {
    referenced_columns(config, filters).contains(&column)
}

/// Whether the chart needs per-visit duration.
pub fn needs_visit_duration(config: &ChartConfig, filters: &[Filter]) -> bool {
    references(config, filters, VISIT_DURATION)
}
