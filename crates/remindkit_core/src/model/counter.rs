//! Time counter model.
//!
//! A counter tracks the distance between `now` and a fixed target instant:
//! counting down while the target is ahead, counting up once it has passed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one time counter.
pub type CounterId = Uuid;

/// Persisted time counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeCounter {
    pub id: CounterId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target: DateTime<Utc>,
}

/// Validation errors for counter definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterValidationError {
    EmptyTitle,
}

impl Display for CounterValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "counter title must not be empty"),
        }
    }
}

impl Error for CounterValidationError {}

impl TimeCounter {
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        target: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into().trim().to_string(),
            description: description
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            target,
        }
    }

    pub fn validate(&self) -> Result<(), CounterValidationError> {
        if self.title.trim().is_empty() {
            return Err(CounterValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Returns whether the target has been reached at `now`.
    pub fn is_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.target <= now
    }

    /// Breaks the distance between `now` and the target into display parts.
    pub fn parts_at(&self, now: DateTime<Utc>) -> CountdownParts {
        CountdownParts::between(self.target, now)
    }
}

/// Days/hours/minutes/seconds breakdown of `|target - now|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownParts {
    pub days: i64,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    /// `true` once the target is at or before `now`.
    pub elapsed: bool,
}

impl CountdownParts {
    pub fn between(target: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let diff_ms = target.timestamp_millis().saturating_sub(now.timestamp_millis());
        let total_secs = diff_ms.unsigned_abs() / 1_000;
        // Values below 60/24 always fit in u8.
        Self {
            days: i64::try_from(total_secs / 86_400).unwrap_or(i64::MAX),
            hours: ((total_secs / 3_600) % 24) as u8,
            minutes: ((total_secs / 60) % 60) as u8,
            seconds: (total_secs % 60) as u8,
            elapsed: diff_ms <= 0,
        }
    }
}

impl Display for CountdownParts {
    /// Renders `[<d>d ]HH:MM:SS`, omitting days when zero.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.days > 0 {
            write!(f, "{}d ", self.days)?;
        }
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}
