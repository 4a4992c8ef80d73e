//! Configuration module for chartsql.
//!
//! Handles table locations, engine defaults and environment expansion.

mod settings;

pub use settings::{
    expand_env_vars, EngineSettings, Settings, SettingsError, TableKind, TableSettings,
};
