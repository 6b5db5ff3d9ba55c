//! Runtime configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe database, logging, scheduler and notification settings.
//! - Fill defaults for omitted sections and validate ranges once at load.
//!
//! # Invariants
//! - A validated config always has a non-zero poll interval within
//!   `POLL_INTERVAL_MS_RANGE`.
//! - `calendar_utc_offset_minutes` maps to a valid `FixedOffset`.

use crate::notify::NotificationPermission;
use chrono::FixedOffset;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_FILE_NAME: &str = "remindkit.sqlite3";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_BACKGROUND_MIN_INTERVAL_SECS: u64 = 60;
/// Poll cadence must stay short relative to the smallest custom interval.
pub const POLL_INTERVAL_MS_RANGE: RangeInclusive<u64> = 100..=60_000;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            logging: LoggingConfig::default(),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    pub level: Option<String>,
    /// Absolute directory for rolling log files. File logging is off when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub poll_interval_ms: u64,
    /// Offset used for monthly/yearly wall-clock arithmetic.
    pub calendar_utc_offset_minutes: i32,
    /// Approximate minimum spacing hint for host-driven background wake-ups.
    pub background_min_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            calendar_utc_offset_minutes: 0,
            background_min_interval_secs: DEFAULT_BACKGROUND_MIN_INTERVAL_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn background_min_interval(&self) -> Duration {
        Duration::from_secs(self.background_min_interval_secs)
    }

    /// Returns the calendar offset, or `None` when out of range.
    pub fn calendar_offset(&self) -> Option<FixedOffset> {
        self.calendar_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationConfig {
    /// `granted|denied|prompt`.
    pub permission: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            permission: NotificationPermission::Granted.as_str().to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn permission(&self) -> Result<NotificationPermission, ConfigError> {
        self.permission
            .parse()
            .map_err(|err| ConfigError::Invalid(format!("notifications.permission: {err}")))
    }
}

impl CoreConfig {
    /// Reads, parses and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path must not be empty".to_string()));
        }
        if !POLL_INTERVAL_MS_RANGE.contains(&self.scheduler.poll_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "scheduler.poll_interval_ms must be within {}..={}, got {}",
                POLL_INTERVAL_MS_RANGE.start(),
                POLL_INTERVAL_MS_RANGE.end(),
                self.scheduler.poll_interval_ms
            )));
        }
        if self.scheduler.calendar_offset().is_none() {
            return Err(ConfigError::Invalid(format!(
                "scheduler.calendar_utc_offset_minutes out of range: {}",
                self.scheduler.calendar_utc_offset_minutes
            )));
        }
        if self.scheduler.background_min_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.background_min_interval_secs must be positive".to_string(),
            ));
        }
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        self.notifications.permission()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use crate::notify::NotificationPermission;
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.scheduler.poll_interval(), Duration::from_secs(1));
        assert_eq!(
            config.notifications.permission().unwrap(),
            NotificationPermission::Granted
        );
    }

    #[test]
    fn parses_all_sections() {
        let config = CoreConfig::from_toml_str(
            r#"
db_path = "/var/lib/remindkit/reminders.sqlite3"

[logging]
level = "debug"
dir = "/var/log/remindkit"

[scheduler]
poll_interval_ms = 2500
calendar_utc_offset_minutes = 120

[notifications]
permission = "prompt"
"#,
        )
        .unwrap();

        assert_eq!(config.scheduler.poll_interval_ms, 2500);
        assert_eq!(
            config.scheduler.calendar_offset().unwrap().local_minus_utc(),
            7200
        );
        assert_eq!(config.scheduler.background_min_interval_secs, 60);
        assert_eq!(
            config.notifications.permission().unwrap(),
            NotificationPermission::Prompt
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = CoreConfig::from_toml_str("[scheduler]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("poll_interval_ms")));

        let err = CoreConfig::from_toml_str("[scheduler]\ncalendar_utc_offset_minutes = 1440\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = CoreConfig::from_toml_str("[logging]\ndir = \"logs\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("absolute")));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = CoreConfig::from_toml_str("[scheduler]\ntick = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
