//! Configuration management for riskregister.
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
use crate::risk::{SeverityThresholds, MAX_SCORE};
use crate::timeline::{StatusSource, TimelineSettings};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "riskregister";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "register.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `RISKREGISTER_`)
/// 2. TOML config file at `~/.config/riskregister/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Register defaults.
    pub register: RegisterConfig,
    /// Severity scoring configuration.
    pub scoring: ScoringConfig,
    /// Timeline configuration.
    pub timeline: TimelineConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/riskregister/register.db`
    pub database_path: Option<PathBuf>,
}

/// Register defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// Project used when a command is not given `--project`.
    pub default_project: Option<String>,
}

/// Severity band thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Scores at or above this are moderate.
    pub moderate_threshold: u8,
    /// Scores at or above this are high.
    pub high_threshold: u8,
}

/// Timeline sampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Longest project span (days) sampled weekly.
    pub week_max_days: u32,
    /// Longest project span (days) sampled monthly.
    pub month_max_days: u32,
    /// Where past statuses come from: `history` or `current`.
    pub status_source: StatusSource,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let thresholds = SeverityThresholds::default();
        Self {
            moderate_threshold: thresholds.moderate,
            high_threshold: thresholds.high,
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            week_max_days: 120,
            month_max_days: 730,
            status_source: StatusSource::History,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `RISKREGISTER_`)
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
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("RISKREGISTER_").split("__"));

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
        let scoring = &self.scoring;
        if scoring.moderate_threshold == 0 || scoring.high_threshold > MAX_SCORE {
            return Err(Error::ConfigValidation {
                message: format!("severity thresholds must lie within 1..={MAX_SCORE}"),
            });
        }
        if scoring.moderate_threshold >= scoring.high_threshold {
            return Err(Error::ConfigValidation {
                message: format!(
                    "moderate_threshold ({}) must be lower than high_threshold ({})",
                    scoring.moderate_threshold, scoring.high_threshold
                ),
            });
        }

        if self.timeline.week_max_days == 0 {
            return Err(Error::ConfigValidation {
                message: "week_max_days must be greater than 0".to_string(),
            });
        }
        if self.timeline.week_max_days >= self.timeline.month_max_days {
            return Err(Error::ConfigValidation {
                message: format!(
                    "week_max_days ({}) must be lower than month_max_days ({})",
                    self.timeline.week_max_days, self.timeline.month_max_days
                ),
            });
        }

        if let Some(project) = &self.register.default_project {
            if project.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "default_project must not be blank".to_string(),
                });
            }
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

    /// Severity thresholds for classifying scores.
    #[must_use]
    pub fn severity_thresholds(&self) -> SeverityThresholds {
        SeverityThresholds {
            moderate: self.scoring.moderate_threshold,
            high: self.scoring.high_threshold,
        }
    }

    /// Settings for building timelines.
    #[must_use]
    pub fn timeline_settings(&self) -> TimelineSettings {
        TimelineSettings {
            week_max_days: i64::from(self.timeline.week_max_days),
            month_max_days: i64::from(self.timeline.month_max_days),
            status_source: self.timeline.status_source,
        }
    }
}
