//! BI tool template syntax.
//!
//! The downstream tool substitutes three forms at view time:
//! - `{{name}}` - required value
//! - `[[ AND {{name}} ]]` - optional clause, dropped when `name` is unset
//! - `[[ {{name}} --]] 'default'` - value with a literal fallback

use std::sync::LazyLock;

use regex::Regex;

use crate::sql::{lit_str, optional_template, template, Condition, Expr};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\{\{\s*([^{}]*?)\s*\}\}\s*$").unwrap());

/// Variable name carried by a filter value such as `{{event_name}}`.
///
/// A value without braces is taken as the name itself; an empty value falls
/// back to `column`. The result is restricted to word characters.
pub fn variable_name(value: Option<&str>, column: &str) -> String {
    let raw = match value.map(str::trim) {
        Some(v) => match PLACEHOLDER.captures(v) {
            Some(caps) => caps.get(1).map_or("", |m| m.as_str()).to_string(),
            None => v.to_string(),
        },
        None => String::new(),
    };
    let name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.trim_matches('_').is_empty() {
        column.to_string()
    } else {
        name
    }
}

/// `{{name}}`
pub fn required(name: &str) -> Expr {
    template(name)
}

/// `[[ AND {{name}} ]]`
pub fn optional_clause(name: &str) -> Condition {
    Condition::Optional(name.to_string())
}

/// `[[ {{name}} --]] 'fallback'`
pub fn with_fallback(name: &str, fallback: &str) -> Expr {
    optional_template(name, lit_str(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Dialect;

    #[test]
    fn test_variable_name_strips_braces() {
        assert_eq!(variable_name(Some("{{event_name}}"), "x"), "event_name");
        assert_eq!(variable_name(Some("{{ url }}"), "x"), "url");
        assert_eq!(variable_name(Some("side"), "x"), "side");
    }

    #[test]
    fn test_variable_name_falls_back_to_column() {
        assert_eq!(variable_name(None, "url_path"), "url_path");
        assert_eq!(variable_name(Some("{{}}"), "url_path"), "url_path");
        assert_eq!(variable_name(Some("  "), "url_path"), "url_path");
    }

    #[test]
    fn test_variable_name_is_word_only() {
        assert_eq!(variable_name(Some("{{a b}}"), "x"), "a_b");
        assert_eq!(variable_name(Some("{{x}} OR 1=1"), "col"), "__x___OR_1_1");
    }

    #[test]
    fn test_forms() {
        let d = Dialect::BigQuery;
        assert_eq!(required("side").to_sql(d), "{{side}}");
        assert_eq!(with_fallback("url_path", "/").to_sql(d), "[[ {{url_path}} --]] '/'");
        assert_eq!(optional_clause("created_at"), Condition::Optional("created_at".into()));
    }
}
