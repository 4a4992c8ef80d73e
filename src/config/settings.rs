//! TOML-based configuration for chartsql.
//!
//! Supports a config file (chartsql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [tables]
//! project = "${ANALYTICS_PROJECT}"
//! dataset = "umami"
//! events = "public_website_event"
//! sessions = "public_session"
//! event_data = "public_event_data"
//!
//! [engine]
//! default_session_column = "session_id"
//! url_path_default = "/"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Warehouse table locations.
    pub tables: TableSettings,

    /// Query generation knobs.
    pub engine: EngineSettings,
}

/// The three tables of the event-log schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// One row per page view or custom event.
    Events,
    /// One row per session, holding device and location attributes.
    Sessions,
    /// Per-event key/value attributes.
    EventData,
}

/// Where the event-log tables live.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TableSettings {
    pub project: String,
    pub dataset: String,
    pub events: String,
    pub sessions: String,
    pub event_data: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            project: "analytics-prod".to_string(),
            dataset: "umami".to_string(),
            events: "public_website_event".to_string(),
            sessions: "public_session".to_string(),
            event_data: "public_event_data".to_string(),
        }
    }
}

impl TableSettings {
    /// Fully-qualified `project.dataset.table` path.
    ///
    /// A table name that already contains a `.` is taken as a full path.
    pub fn qualified(&self, kind: TableKind) -> String {
        let table = match kind {
            TableKind::Events => &self.events,
            TableKind::Sessions => &self.sessions,
            TableKind::EventData => &self.event_data,
        };
        if table.contains('.') {
            table.clone()
        } else {
            format!("{}.{}.{}", self.project, self.dataset, table)
        }
    }

    /// Expand environment variables in every field.
    fn expanded(&self) -> Result<Self, SettingsError> {
        Ok(Self {
            project: expand_env_vars(&self.project)?,
            dataset: expand_env_vars(&self.dataset)?,
            events: expand_env_vars(&self.events)?,
            sessions: expand_env_vars(&self.sessions)?,
            event_data: expand_env_vars(&self.event_data)?,
        })
    }

    fn validate(&self) -> Result<(), SettingsError> {
        for (field, value) in [
            ("events", &self.events),
            ("sessions", &self.sessions),
            ("event_data", &self.event_data),
        ] {
            if value.trim().is_empty() {
                return Err(SettingsError::InvalidConfig(format!(
                    "tables.{} must not be empty",
                    field
                )));
            }
            if !value.contains('.') && (self.project.trim().is_empty() || self.dataset.trim().is_empty()) {
                return Err(SettingsError::InvalidConfig(format!(
                    "tables.{} is not a full path, so tables.project and tables.dataset are required",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Query generation settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Column counted by `distinct`/`percentage` metrics without a column.
    pub default_session_column: String,

    /// Fallback literal of the optional `url_path` template.
    pub url_path_default: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_session_column: "session_id".to_string(),
            url_path_default: "/".to_string(),
        }
    }
}

impl EngineSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        if self.default_session_column.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "engine.default_session_column must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Parse settings from TOML text, expanding environment variables.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let raw: Settings = toml::from_str(content)?;
        let settings = Settings {
            tables: raw.tables.expanded()?,
            engine: EngineSettings {
                default_session_column: expand_env_vars(&raw.engine.default_session_column)?,
                url_path_default: expand_env_vars(&raw.engine.url_path_default)?,
            },
        };
        settings.tables.validate()?;
        settings.engine.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `CHARTSQL_CONFIG`
    /// 2. `./chartsql.toml`
    /// 3. `~/.config/chartsql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        // Check environment variable first
        if let Ok(path) = env::var("CHARTSQL_CONFIG") {
            return Self::from_file(&path);
        }

        // Check local directory
        let local_config = PathBuf::from("chartsql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("chartsql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        tracing::debug!("no config file found, using defaults");
        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            // $VAR (ends at non-alphanumeric/underscore)
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
