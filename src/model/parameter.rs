//! Known per-event attributes.

use serde::{Deserialize, Serialize};

/// A custom event property discovered from sample data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// `<eventName>.<paramName>` or just `<paramName>`.
    pub key: String,
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
}

impl Parameter {
    pub fn new(key: &str, param_type: ParameterType) -> Self {
        Self {
            key: key.into(),
            param_type,
        }
    }

    /// The attribute key as stored in the attribute table: everything after
    /// the first `.` of `key`, or the whole key.
    pub fn name(&self) -> &str {
        match self.key.split_once('.') {
            Some((_, name)) => name,
            None => &self.key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Number,
}

impl ParameterType {
    /// Column of the attribute table holding values of this type.
    pub fn value_column(&self) -> &'static str {
        match self {
            ParameterType::String => "string_value",
            ParameterType::Number => "number_value",
        }
    }
}
