//! Configuration management
//!
//! Settings are resolved once per process in this order:
//! 1. Environment variables
//! 2. `calbot.toml` config file
//! 3. Defaults
//!
//! `${VAR_NAME}` inside the config file is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::templates::{PollTemplates, ReportTemplates};
use crate::time::{DEFAULT_TIMEZONE, LocalTimezone};
use crate::{Error, Result};

/// Deployment environment; drives poll timing and vote thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Testing,
    Production,
}

impl Environment {
    /// Interpret a `TESTING_ENVIRONMENT` value. Anything but an explicit
    /// false-ish value keeps the bot in testing mode.
    pub fn from_testing_flag(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "false" | "0" | "no" | "off" => Environment::Production,
            _ => Environment::Testing,
        }
    }

    pub fn is_testing(&self) -> bool {
        *self == Environment::Testing
    }
}

/// CalDAV server settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaldavConfig {
    /// Server base URL
    pub url: Option<String>,
    /// Path of the calendar, appended to `url`
    pub calendar_path: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Telegram delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Target chat (numeric id or `@channelname`)
    pub chat_id: Option<String>,
    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            api_url: default_telegram_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Schedule file path; the default search paths are used when unset
    pub config_path: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            config_path: None,
        }
    }
}

/// Main configuration for calbot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IANA identifier of the canonical local timezone
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub caldav: CaldavConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub templates: ReportTemplates,

    #[serde(default)]
    pub poll: PollTemplates,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            environment: Environment::default(),
            caldav: CaldavConfig::default(),
            telegram: TelegramConfig::default(),
            store: StoreConfig::default(),
            scheduler: SchedulerConfig::default(),
            templates: ReportTemplates::default(),
            poll: PollTemplates::default(),
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_db_path() -> String {
    "data/calbot.db".to_string()
}

/// Read a variable, treating empty values as unset
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Expand `${VAR_NAME}` references from the environment.
    ///
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse a TOML document (after env expansion), without env overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        Ok(Self::from_toml_config(toml))
    }

    /// Load configuration from a TOML file, then apply env overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Load from `path` (or `./calbot.toml`), falling back to the
    /// environment alone when no file exists
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None if Path::new("calbot.toml").exists() => Self::from_toml_file("calbot.toml"),
            None => Ok(Self::from_env()),
        }
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    fn from_toml_config(toml: TomlConfig) -> Self {
        let caldav = toml.caldav.unwrap_or_default();
        let telegram = toml.telegram.unwrap_or_default();
        let store = toml.store.unwrap_or_default();
        let scheduler = toml.scheduler.unwrap_or_default();

        Config {
            timezone: toml.timezone.unwrap_or_else(default_timezone),
            environment: toml
                .testing
                .map(|testing| {
                    if testing {
                        Environment::Testing
                    } else {
                        Environment::Production
                    }
                })
                .unwrap_or_default(),
            caldav: CaldavConfig {
                url: caldav.url,
                calendar_path: caldav.calendar_path,
                username: caldav.username,
                password: caldav.password,
            },
            telegram: TelegramConfig {
                token: telegram.token,
                chat_id: telegram.chat_id,
                api_url: telegram.api_url.unwrap_or_else(default_telegram_api_url),
            },
            store: StoreConfig {
                db_path: store.db_path.unwrap_or_else(default_db_path),
            },
            scheduler: SchedulerConfig {
                enabled: scheduler.enabled.unwrap_or(true),
                config_path: scheduler.config_path,
            },
            templates: toml.templates.unwrap_or_default(),
            poll: toml.poll.unwrap_or_default(),
        }
    }

    /// Environment variables take precedence over the file
    fn apply_env_overrides(&mut self) {
        if let Some(tz) = env_var("TIMEZONE") {
            self.timezone = tz;
        }
        if let Some(flag) = env_var("TESTING_ENVIRONMENT") {
            self.environment = Environment::from_testing_flag(&flag);
        }

        if let Some(url) = env_var("CALDAV_URL") {
            self.caldav.url = Some(url);
        }
        if let Some(path) = env_var("CALENDAR_PATH") {
            self.caldav.calendar_path = Some(path);
        }
        if let Some(username) = env_var("CALDAV_USERNAME") {
            self.caldav.username = Some(username);
        }
        if let Some(password) = env_var("CALDAV_PASSWORD") {
            self.caldav.password = Some(password);
        }

        if let Some(token) = env_var("TELEGRAM_BOT_TOKEN") {
            self.telegram.token = Some(token);
        }
        if let Some(chat_id) = env_var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(url) = env_var("TELEGRAM_API_URL") {
            self.telegram.api_url = url;
        }

        if let Some(path) = env_var("DB_PATH") {
            self.store.db_path = path;
        }

        if let Some(enabled) = env_var("SCHEDULE_ENABLED") {
            self.scheduler.enabled = enabled.to_lowercase() != "false";
        }
        if let Some(path) = env_var("SCHEDULE_CONFIG_PATH") {
            self.scheduler.config_path = Some(path);
        }
    }

    /// The canonical local timezone
    pub fn timezone(&self) -> Result<LocalTimezone> {
        LocalTimezone::parse(&self.timezone)
    }

    /// Token and chat id, required by every mode that posts to the chat
    pub fn require_telegram(&self) -> Result<(&str, &str)> {
        let token = self
            .telegram
            .token
            .as_deref()
            .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN not set".to_string()))?;
        let chat_id = self
            .telegram
            .chat_id
            .as_deref()
            .ok_or_else(|| Error::Config("TELEGRAM_CHAT_ID not set".to_string()))?;
        Ok((token, chat_id))
    }

    /// CalDAV URL, required by the report pipelines
    pub fn require_calendar(&self) -> Result<&str> {
        self.caldav
            .url
            .as_deref()
            .ok_or_else(|| Error::Config("CALDAV_URL not set".to_string()))
    }
}

// ============================================================================
// TOML file structures
// ============================================================================

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    timezone: Option<String>,
    testing: Option<bool>,
    caldav: Option<TomlCaldavConfig>,
    telegram: Option<TomlTelegramConfig>,
    store: Option<TomlStoreConfig>,
    scheduler: Option<TomlSchedulerConfig>,
    templates: Option<ReportTemplates>,
    poll: Option<PollTemplates>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlCaldavConfig {
    url: Option<String>,
    calendar_path: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlTelegramConfig {
    token: Option<String>,
    chat_id: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlStoreConfig {
    db_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlSchedulerConfig {
    enabled: Option<bool>,
    config_path: Option<String>,
}
