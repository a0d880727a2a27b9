//! Configuration management for Octofr
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable
//! overrides of the account credentials.

use crate::error::{OctoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Default GraphQL endpoint of the French Kraken platform
pub const DEFAULT_API_ENDPOINT: &str = "https://api.oefr-kraken.energy/v1/graphql/";

/// Default refresh interval in minutes
pub const DEFAULT_SCAN_INTERVAL_MINUTES: u64 = 60;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account identification and credentials
    pub account: AccountConfig,

    /// GraphQL API connection settings
    pub api: ApiConfig,

    /// Interval between two refresh cycles, in minutes
    pub scan_interval_minutes: u64,

    /// Granularity requested for energy readings
    pub reading_frequency: ReadingFrequency,

    /// IANA timezone used for "now" and the current calendar month
    pub timezone: String,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Account identification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Customer account number (e.g. A-1234ABCD)
    pub account_number: String,

    /// Login email used to obtain an API token
    pub email: String,

    /// Login password used to obtain an API token
    pub password: String,
}

/// GraphQL API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Renew the token this many seconds before it is considered stale
    pub token_refresh_margin_seconds: u64,

    /// Assumed lifetime of an obtained token in seconds
    pub token_max_age_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Reading granularity accepted by the energy readings query.
///
/// Unknown strings are kept verbatim so that the refresh window falls back
/// to its default instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReadingFrequency {
    HourInterval,
    DayInterval,
    WeekInterval,
    MonthInterval,
    Other(String),
}

impl ReadingFrequency {
    pub fn as_str(&self) -> &str {
        match self {
            Self::HourInterval => "HOUR_INTERVAL",
            Self::DayInterval => "DAY_INTERVAL",
            Self::WeekInterval => "WEEK_INTERVAL",
            Self::MonthInterval => "MONTH_INTERVAL",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Human-readable label exposed in sensor attributes
    pub fn label(&self) -> &str {
        match self {
            Self::HourInterval => "Hourly (72-hour window)",
            Self::DayInterval => "Daily (31-day window)",
            Self::WeekInterval => "Weekly",
            Self::MonthInterval => "Monthly",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Whether the readings query is known to accept this value
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::HourInterval | Self::DayInterval)
    }
}

impl From<String> for ReadingFrequency {
    fn from(value: String) -> Self {
        match value.as_str() {
            "HOUR_INTERVAL" => Self::HourInterval,
            "DAY_INTERVAL" => Self::DayInterval,
            "WEEK_INTERVAL" => Self::WeekInterval,
            "MONTH_INTERVAL" => Self::MonthInterval,
            _ => Self::Other(value),
        }
    }
}

impl From<ReadingFrequency> for String {
    fn from(value: ReadingFrequency) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ReadingFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first existing default location and
    /// apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("OCTOFR_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::load_from_default_paths()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_default_paths() -> Result<Self> {
        let default_paths = ["octofr.yaml", "/data/octofr.yaml", "/etc/octofr/config.yaml"];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Override account settings from `OCTOFR_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if let Some(v) = read("OCTOFR_ACCOUNT_NUMBER") {
            self.account.account_number = v.trim().to_string();
        }
        if let Some(v) = read("OCTOFR_EMAIL") {
            self.account.email = v.trim().to_string();
        }
        if let Some(v) = read("OCTOFR_PASSWORD") {
            self.account.password = v;
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Interval between two refresh cycles
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_minutes.saturating_mul(60))
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| OctoError::validation("timezone", "Unknown IANA timezone"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.account.account_number.trim().is_empty() {
            return Err(OctoError::validation(
                "account.account_number",
                "Account number cannot be empty",
            ));
        }

        if self.api.endpoint.trim().is_empty() {
            return Err(OctoError::validation(
                "api.endpoint",
                "Endpoint cannot be empty",
            ));
        }

        if self.api.timeout_seconds == 0 {
            return Err(OctoError::validation(
                "api.timeout_seconds",
                "Must be greater than 0",
            ));
        }

        if self.api.token_refresh_margin_seconds >= self.api.token_max_age_seconds {
            return Err(OctoError::validation(
                "api.token_refresh_margin_seconds",
                "Must be lower than api.token_max_age_seconds",
            ));
        }

        if self.scan_interval_minutes == 0 {
            return Err(OctoError::validation(
                "scan_interval_minutes",
                "Must be greater than 0",
            ));
        }

        self.tz()?;

        Ok(())
    }
}
