//! Schedule configuration
//!
//! Loaded from a TOML file with one `[[schedules]]` table per entry:
//!
//! ```toml
//! [[schedules]]
//! name = "weekly-overview"
//! cron = "0 0 18 * * Sun"
//! job = "weekly_overview"
//! ```

use calbot_core::JobKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Result, ScheduleError};
use crate::scheduler::parse_cron;

/// Search order when no path is configured
const DEFAULT_PATHS: [&str; 3] = ["schedule.toml", "config/schedule.toml", ".calbot/schedule.toml"];

/// All schedule entries
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,
}

/// One scheduled job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,

    /// Cron expression with a leading seconds field, e.g. `"0 0 9 * * Mon"`
    pub cron: String,

    pub job: JobKind,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ScheduleConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ScheduleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScheduleError::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded {} schedule entries from {}", config.schedules.len(), path.display());
        Ok(config)
    }

    /// Load from the default locations; empty when no file exists
    pub fn load_default() -> Result<Self> {
        for path in &DEFAULT_PATHS {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        info!("No schedule file found, scheduler has nothing to run");
        Ok(Self::default())
    }

    /// Load from `path`, or from the default locations when `None`
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::load_default(),
        }
    }

    /// Check every cron expression up front
    pub fn validate(&self) -> Result<()> {
        for entry in &self.schedules {
            parse_cron(&entry.cron).map_err(|source| ScheduleError::CronParse {
                name: entry.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Only the enabled entries
    pub fn enabled_entries(&self) -> Vec<&ScheduleEntry> {
        self.schedules.iter().filter(|e| e.enabled).collect()
    }
}
