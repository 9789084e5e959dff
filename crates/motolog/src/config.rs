//! Configuration management for motolog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "motolog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "motolog.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `MOTOLOG_`)
/// 2. TOML config file at `~/.config/motolog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Lap import configuration.
    pub laps: LapConfig,
    /// Maintenance reminder thresholds.
    pub reminders: ReminderConfig,
    /// Local user configuration.
    pub user: UserConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/motolog/motolog.db`
    pub database_path: Option<PathBuf>,
}

/// Lap import configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapConfig {
    /// Maximum number of laps accepted from one file.
    pub max_laps: usize,
    /// Maximum size of an uploaded lap file in bytes.
    pub max_file_bytes: u64,
    /// Laps slower than `median * outlier_multiplier` count as outliers.
    pub outlier_multiplier: f64,
    /// Douglas-Peucker tolerance in metres for map tracks.
    pub simplify_epsilon: f64,
}

/// Reminder threshold configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Remaining distance at or below which a reminder is a warning.
    pub km_warning: i64,
    /// Remaining days at or below which a reminder is a warning.
    pub days_warning: i64,
    /// Remaining distance at or below which a reminder is overdue.
    pub km_danger: i64,
    /// Remaining days at or below which a reminder is overdue.
    pub days_danger: i64,
}

/// Local user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Username that owns records created from the CLI.
    pub username: String,
}

impl Default for LapConfig {
    fn default() -> Self {
        Self {
            max_laps: crate::laps::MAX_LAPS,
            max_file_bytes: 10 * 1024 * 1024,
            outlier_multiplier: crate::laps::DEFAULT_OUTLIER_MULTIPLIER,
            simplify_epsilon: 1.0,
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            km_warning: 500,
            days_warning: 14,
            km_danger: 0,
            days_danger: 0,
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: "rider".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("MOTOLOG_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.laps.max_laps == 0 {
            return Err(Error::ConfigValidation {
                message: "laps.max_laps must be greater than 0".to_string(),
            });
        }

        if self.laps.max_file_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "laps.max_file_bytes must be greater than 0".to_string(),
            });
        }

        if self.laps.outlier_multiplier.is_nan() || self.laps.outlier_multiplier <= 1.0 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "laps.outlier_multiplier ({}) must be greater than 1",
                    self.laps.outlier_multiplier
                ),
            });
        }

        if self.laps.simplify_epsilon.is_nan() || self.laps.simplify_epsilon < 0.0 {
            return Err(Error::ConfigValidation {
                message: "laps.simplify_epsilon cannot be negative".to_string(),
            });
        }

        if self.reminders.km_danger > self.reminders.km_warning {
            return Err(Error::ConfigValidation {
                message: format!(
                    "reminders.km_danger ({}) cannot be greater than reminders.km_warning ({})",
                    self.reminders.km_danger, self.reminders.km_warning
                ),
            });
        }

        if self.reminders.days_danger > self.reminders.days_warning {
            return Err(Error::ConfigValidation {
                message: format!(
                    "reminders.days_danger ({}) cannot be greater than reminders.days_warning ({})",
                    self.reminders.days_danger, self.reminders.days_warning
                ),
            });
        }

        if self.user.username.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "user.username cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}
