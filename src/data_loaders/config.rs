use std::{fs, io, path::Path};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::json::{self, JsonFileError};

pub const MIN_WIDTH: u32 = 800;
pub const MIN_HEIGHT: u32 = 600;
pub const MIN_LIFESPAN: u32 = 1;
pub const MAX_LIFESPAN: u32 = 150;
pub const CONFIG_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Life,
    Year,
    Goal,
}

/// Flat key-value configuration. Every field carries a default so documents
/// written by older versions load cleanly; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub mode: Mode,
    pub dob: String,
    pub lifespan: u32,
    pub goal_start: String,
    pub goal_end: String,
    pub goal_title: String,
    pub goal_subtitle: String,
    pub resolution_width: u32,
    pub resolution_height: u32,
    pub config_version: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Life,
            dob: String::new(),
            lifespan: 90,
            goal_start: String::new(),
            goal_end: String::new(),
            goal_title: String::new(),
            goal_subtitle: String::new(),
            resolution_width: 1920,
            resolution_height: 1080,
            config_version: CONFIG_VERSION,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found")]
    Missing,
    #[error("failed to access config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON in config file: {0}")]
    Malformed(serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

impl CalendarConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match json::read_json(path) {
            Ok(config) => Ok(config),
            Err(JsonFileError::Missing) => Err(ConfigError::Missing),
            Err(JsonFileError::Io(e)) => Err(ConfigError::Io(e)),
            Err(JsonFileError::Malformed(e)) => Err(ConfigError::Malformed(e)),
        }
    }

    /// Persist the config, keeping a best-effort `.bak` of the previous
    /// document before the atomic replace.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = fs::copy(path, path.with_file_name(format!("{name}.bak")));
        }

        json::write_json_atomic(path, self)?;
        Ok(())
    }

    /// Strict per-mode validation; runs before any rendering attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution_width < MIN_WIDTH || self.resolution_height < MIN_HEIGHT {
            return Err(invalid(format!(
                "Resolution must be at least {MIN_WIDTH}x{MIN_HEIGHT}"
            )));
        }

        match self.mode {
            Mode::Life => self.validate_life(),
            Mode::Year => Ok(()),
            Mode::Goal => self.validate_goal(),
        }
    }

    fn validate_life(&self) -> Result<(), ConfigError> {
        if self.dob.is_empty() {
            return Err(invalid("Date of birth is required for life calendar"));
        }

        let dob = parse_iso_date(&self.dob)
            .ok_or_else(|| invalid("Invalid date of birth format. Use YYYY-MM-DD"))?;
        if dob > Local::now().date_naive() {
            return Err(invalid("Date of birth cannot be in the future"));
        }

        if self.lifespan < MIN_LIFESPAN || self.lifespan > MAX_LIFESPAN {
            return Err(invalid(format!(
                "Lifespan must be between {MIN_LIFESPAN} and {MAX_LIFESPAN} years"
            )));
        }

        Ok(())
    }

    fn validate_goal(&self) -> Result<(), ConfigError> {
        if self.goal_start.is_empty() || self.goal_end.is_empty() {
            return Err(invalid("Goal start and end dates are required"));
        }
        if self.goal_title.trim().is_empty() {
            return Err(invalid("Goal title is required"));
        }

        let start = parse_iso_date(&self.goal_start)
            .ok_or_else(|| invalid("Invalid goal start date format. Use YYYY-MM-DD"))?;
        let end = parse_iso_date(&self.goal_end)
            .ok_or_else(|| invalid("Invalid goal end date format. Use YYYY-MM-DD"))?;

        if end <= start {
            return Err(invalid("Goal end date must be after start date"));
        }

        Ok(())
    }
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(reason.into())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn valid_life_config() -> CalendarConfig {
        CalendarConfig {
            mode: Mode::Life,
            dob: "1990-05-15".to_string(),
            ..CalendarConfig::default()
        }
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifegrid_config.json");
        let config = CalendarConfig {
            mode: Mode::Goal,
            goal_start: "2024-01-01".to_string(),
            goal_end: "2024-12-31".to_string(),
            goal_title: "Ship it".to_string(),
            goal_subtitle: "v2".to_string(),
            ..CalendarConfig::default()
        };

        config.save(&path).unwrap();
        let loaded = CalendarConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn save_backs_up_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifegrid_config.json");
        let bak = dir.path().join("lifegrid_config.json.bak");

        let first = valid_life_config();
        first.save(&path).unwrap();
        assert!(!bak.exists());

        let mut second = first.clone();
        second.lifespan = 85;
        second.save(&path).unwrap();

        assert!(bak.exists());
        let restored: CalendarConfig = crate::data_loaders::json::read_json(&bak).unwrap();
        assert_eq!(restored, first);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults_and_unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifegrid_config.json");
        fs::write(&path, r#"{"mode": "year", "legacy_theme": "dark"}"#).unwrap();

        let loaded = CalendarConfig::load(&path).unwrap();
        assert_eq!(loaded.mode, Mode::Year);
        assert_eq!(loaded.lifespan, 90);
        assert_eq!(loaded.resolution_width, 1920);
        assert_eq!(loaded.config_version, CONFIG_VERSION);
    }

    #[test]
    fn absent_and_malformed_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifegrid_config.json");

        assert!(matches!(
            CalendarConfig::load(&path),
            Err(ConfigError::Missing)
        ));

        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            CalendarConfig::load(&path),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn validates_resolution_floor() {
        let mut config = valid_life_config();
        config.resolution_width = 640;
        config.resolution_height = 480;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validates_life_mode_fields() {
        let mut config = valid_life_config();
        config.dob.clear();
        assert!(config.validate().is_err());

        config.dob = "15/05/1990".to_string();
        assert!(config.validate().is_err());

        config.dob = "2999-01-01".to_string();
        assert!(config.validate().is_err());

        config.dob = "1990-05-15".to_string();
        config.lifespan = 0;
        assert!(config.validate().is_err());
        config.lifespan = 151;
        assert!(config.validate().is_err());
        config.lifespan = 90;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validates_goal_mode_fields() {
        let mut config = CalendarConfig {
            mode: Mode::Goal,
            goal_start: "2024-01-01".to_string(),
            goal_end: "2024-12-31".to_string(),
            goal_title: "Marathon".to_string(),
            ..CalendarConfig::default()
        };
        assert!(config.validate().is_ok());

        config.goal_title = "   ".to_string();
        assert!(config.validate().is_err());

        config.goal_title = "Marathon".to_string();
        config.goal_end = "2024-01-01".to_string();
        assert!(config.validate().is_err());

        config.goal_end = "garbage".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn year_mode_only_needs_resolution() {
        let config = CalendarConfig {
            mode: Mode::Year,
            ..CalendarConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
