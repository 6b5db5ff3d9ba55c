//! Reminder domain model.
//!
//! # Responsibility
//! - Define the persisted reminder record and its repeat rule.
//! - Derive the delivery state (`Waiting`/`Owed`/`Satisfied`) from stored fields.
//! - Validate reminder definitions before they reach storage.
//!
//! # Invariants
//! - `id` is stable and never reused for another reminder.
//! - `name` is non-empty after trimming.
//! - `RepeatRule::Custom` always carries a positive interval.
//! - `due_at` carries millisecond precision, matching storage.
//! - `revision` only grows; every persisted mutation bumps it.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier for one reminder record.
pub type ReminderId = Uuid;

static CUSTOM_RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:every\s+)?(\d+)\s*([a-z]+)$").expect("valid custom repeat rule regex")
});

/// Unit for `RepeatRule::Custom` intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl CustomUnit {
    /// Length of one unit in milliseconds.
    pub fn millis(self) -> i64 {
        match self {
            Self::Seconds => 1_000,
            Self::Minutes => 60 * 1_000,
            Self::Hours => 60 * 60 * 1_000,
            Self::Days => 24 * 60 * 60 * 1_000,
        }
    }

    /// Stable storage/display token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }

    /// Parses a unit token, accepting common abbreviations.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Some(Self::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Some(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Self::Hours),
            "d" | "day" | "days" => Some(Self::Days),
            _ => None,
        }
    }
}

/// Repeat rule of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepeatRule {
    /// Fires once, then stays inert.
    None,
    Hourly,
    Daily,
    Weekly,
    /// One calendar month, clamped to the last valid day.
    Monthly,
    /// One calendar year, clamped to the last valid day.
    Yearly,
    /// Fixed-duration rule; `interval` must be positive.
    Custom { interval: u32, unit: CustomUnit },
}

impl RepeatRule {
    /// Returns whether this rule schedules further occurrences.
    pub fn is_repeating(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns the step length when it does not depend on the calendar.
    ///
    /// `Monthly`/`Yearly` have variable length and return `None`, as does
    /// `None` itself.
    pub fn fixed_step_millis(&self) -> Option<i64> {
        const HOUR_MS: i64 = 60 * 60 * 1_000;
        match self {
            Self::Hourly => Some(HOUR_MS),
            Self::Daily => Some(24 * HOUR_MS),
            Self::Weekly => Some(7 * 24 * HOUR_MS),
            Self::Custom { interval, unit } => i64::from(*interval).checked_mul(unit.millis()),
            Self::None | Self::Monthly | Self::Yearly => None,
        }
    }

    /// Storage token for the rule kind.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom { .. } => "custom",
        }
    }

    /// Rejects custom rules with a zero interval.
    pub fn validate(&self) -> Result<(), ReminderValidationError> {
        if let Self::Custom { interval: 0, .. } = self {
            return Err(ReminderValidationError::NonPositiveInterval);
        }
        Ok(())
    }
}

impl Display for RepeatRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Custom { interval, unit } => write!(f, "every {interval} {}", unit.as_str()),
            other => f.write_str(other.kind_str()),
        }
    }
}

impl FromStr for RepeatRule {
    type Err = ReminderValidationError;

    /// Parses `none|hourly|daily|weekly|monthly|yearly` or a custom rule such
    /// as `every 15 minutes` / `90s`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let rule = match normalized.as_str() {
            "" | "none" | "once" => Self::None,
            "hourly" => Self::Hourly,
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "yearly" => Self::Yearly,
            other => {
                let captures = CUSTOM_RULE_RE
                    .captures(other)
                    .ok_or_else(|| ReminderValidationError::InvalidRepeatRule(other.to_string()))?;
                let interval = captures[1]
                    .parse::<u32>()
                    .map_err(|_| ReminderValidationError::InvalidRepeatRule(other.to_string()))?;
                let unit = CustomUnit::parse(&captures[2])
                    .ok_or_else(|| ReminderValidationError::InvalidRepeatRule(other.to_string()))?;
                Self::Custom { interval, unit }
            }
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// Delivery state derived from `due_at`, `notified` and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    /// `due_at` is still in the future.
    Waiting,
    /// `due_at` has passed and no notification was emitted yet.
    Owed,
    /// Nothing is owed for the current `due_at`.
    Satisfied,
}

/// Validation errors for reminder definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderValidationError {
    EmptyName,
    NonPositiveInterval,
    InvalidRepeatRule(String),
    NegativeRevision(i64),
}

impl Display for ReminderValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "reminder name must not be empty"),
            Self::NonPositiveInterval => {
                write!(f, "custom repeat interval must be a positive integer")
            }
            Self::InvalidRepeatRule(value) => write!(f, "invalid repeat rule: `{value}`"),
            Self::NegativeRevision(value) => {
                write!(f, "reminder revision must not be negative, got {value}")
            }
        }
    }
}

impl Error for ReminderValidationError {}

/// Persisted reminder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Stable ID, assigned at creation.
    pub id: ReminderId,
    /// Display name, used as notification title.
    pub name: String,
    /// Optional notification body.
    pub description: Option<String>,
    /// Instant of the next firing.
    pub due_at: DateTime<Utc>,
    pub repeat_rule: RepeatRule,
    /// `true` means no notification is owed for the current `due_at`.
    pub notified: bool,
    /// Write counter used to reject stale concurrent saves.
    pub revision: i64,
    /// Soft delete tombstone.
    pub is_deleted: bool,
}

impl Reminder {
    /// Creates a new reminder with a generated stable ID.
    ///
    /// # Invariants
    /// - `notified` starts as `false` and `revision` as `0`.
    /// - `due_at` is truncated to millisecond precision.
    /// - Blank descriptions are normalized to `None`.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        due_at: DateTime<Utc>,
        repeat_rule: RepeatRule,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), name, description, due_at, repeat_rule)
    }

    /// Creates a reminder with a caller-provided ID.
    ///
    /// Used by import paths where identity already exists. Does not validate.
    pub fn with_id(
        id: ReminderId,
        name: impl Into<String>,
        description: Option<String>,
        due_at: DateTime<Utc>,
        repeat_rule: RepeatRule,
    ) -> Self {
        Self {
            id,
            name: name.into().trim().to_string(),
            description: description
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            due_at: truncate_to_millis(due_at),
            repeat_rule,
            notified: false,
            revision: 0,
            is_deleted: false,
        }
    }

    /// Validates the record before persistence or after reads.
    pub fn validate(&self) -> Result<(), ReminderValidationError> {
        if self.name.trim().is_empty() {
            return Err(ReminderValidationError::EmptyName);
        }
        if self.revision < 0 {
            return Err(ReminderValidationError::NegativeRevision(self.revision));
        }
        self.repeat_rule.validate()
    }

    /// Derives the delivery state at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> ReminderState {
        if self.notified {
            ReminderState::Satisfied
        } else if self.due_at <= now {
            ReminderState::Owed
        } else {
            ReminderState::Waiting
        }
    }

    /// Marks this reminder as removed and bumps its revision.
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.revision += 1;
    }

    /// Returns whether this reminder is visible to pollers.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Drops sub-millisecond precision so values survive the epoch-ms storage format.
pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or(value)
}
