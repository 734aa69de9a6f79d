//! Console configuration from environment variables.
//!
//! `.env` files are loaded by `main` before [`CliConfig::from_env`] runs, so
//! both sources are seen here as plain environment variables.

use libsys_core::{default_log_level, LogLevel, DEFAULT_OVERDUE_DAYS, DEFAULT_TOP_BORROWED};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "LIBSYS_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "LIBSYS_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "LIBSYS_LOG_DIR";
pub const OVERDUE_DAYS_VAR: &str = "LIBSYS_OVERDUE_DAYS";
pub const TOP_BORROWED_VAR: &str = "LIBSYS_TOP_BORROWED";

const DEFAULT_DB_PATH: &str = "library.db";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub message: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} `{}`: {}", self.key, self.value, self.message)
    }
}

impl Error for ConfigError {}

/// Report sizing knobs handed to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSettings {
    pub overdue_days: u32,
    pub top_borrowed: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            overdue_days: DEFAULT_OVERDUE_DAYS,
            top_borrowed: DEFAULT_TOP_BORROWED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub db_path: PathBuf,
    pub log_level: LogLevel,
    /// File logging stays off when unset.
    pub log_dir: Option<String>,
    pub reports: ReportSettings,
}

impl CliConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let log_level = match get(LOG_LEVEL_VAR) {
            Some(value) => value.parse::<LogLevel>().map_err(|err| ConfigError {
                key: LOG_LEVEL_VAR,
                value: value.clone(),
                message: err.to_string(),
            })?,
            None => default_log_level(),
        };

        let defaults = ReportSettings::default();
        let reports = ReportSettings {
            overdue_days: parse_u32(
                OVERDUE_DAYS_VAR,
                get(OVERDUE_DAYS_VAR),
                defaults.overdue_days,
            )?,
            top_borrowed: parse_u32(
                TOP_BORROWED_VAR,
                get(TOP_BORROWED_VAR),
                defaults.top_borrowed,
            )?,
        };

        Ok(Self {
            db_path: get(DB_PATH_VAR)
                .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
            log_level,
            log_dir: get(LOG_DIR_VAR),
            reports,
        })
    }
}

fn parse_u32(key: &'static str, value: Option<String>, default: u32) -> Result<u32, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.parse::<u32>().map_err(|err| ConfigError {
            key,
            value: value.clone(),
            message: err.to_string(),
        }),
    }
}
