//! Next-occurrence calculation for repeat rules.
//!
//! # Responsibility
//! - Map `(due_at, rule, now)` to the first occurrence strictly after `now`.
//! - Skip every missed occurrence instead of producing a backlog.
//!
//! # Invariants
//! - The result is reachable from `due_at` by one or more whole steps.
//! - The result is strictly greater than `now`.
//! - Fixed-length rules are O(1); calendar rules step one month/year at a time.
//! - Calendar steps clamp to the last valid day of the target month.

use crate::model::reminder::RepeatRule;
use chrono::{DateTime, FixedOffset, Months, Offset, TimeZone, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RecurrenceResult<T> = Result<T, RecurrenceError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    /// The next occurrence falls outside the representable date range.
    OutOfRange { rule: RepeatRule },
    /// A custom rule with a zero interval reached the calculator.
    NonPositiveInterval,
}

impl Display for RecurrenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { rule } => {
                write!(f, "next occurrence for rule `{rule}` is out of range")
            }
            Self::NonPositiveInterval => write!(f, "repeat interval must be positive"),
        }
    }
}

impl Error for RecurrenceError {}

/// Returns the next due time strictly after `now`, evaluating calendar steps in UTC.
///
/// Returns `Ok(None)` for `RepeatRule::None`.
pub fn next_due_at(
    due_at: DateTime<Utc>,
    rule: &RepeatRule,
    now: DateTime<Utc>,
) -> RecurrenceResult<Option<DateTime<Utc>>> {
    next_due_at_in(due_at, rule, now, utc_calendar())
}

/// Returns the next due time strictly after `now`.
///
/// Monthly/yearly steps are applied to the wall-clock time in `calendar`, so
/// a reminder at 10:00 on the 31st in UTC+2 stays at 10:00 local time.
pub fn next_due_at_in(
    due_at: DateTime<Utc>,
    rule: &RepeatRule,
    now: DateTime<Utc>,
    calendar: FixedOffset,
) -> RecurrenceResult<Option<DateTime<Utc>>> {
    if !rule.is_repeating() {
        return Ok(None);
    }
    if let RepeatRule::Custom { interval: 0, .. } = rule {
        return Err(RecurrenceError::NonPositiveInterval);
    }

    let next = match rule.fixed_step_millis() {
        Some(step_ms) => next_fixed(due_at, step_ms, now),
        None => next_calendar(due_at, rule, now, calendar),
    };
    next.map(Some).ok_or(RecurrenceError::OutOfRange { rule: *rule })
}

fn next_fixed(due_at: DateTime<Utc>, step_ms: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let due_ms = due_at.timestamp_millis();
    let now_ms = now.timestamp_millis();

    let steps = if now_ms >= due_ms {
        now_ms.checked_sub(due_ms)? / step_ms + 1
    } else {
        1
    };
    let next_ms = steps
        .checked_mul(step_ms)
        .and_then(|offset| due_ms.checked_add(offset))?;
    DateTime::from_timestamp_millis(next_ms)
}

fn next_calendar(
    due_at: DateTime<Utc>,
    rule: &RepeatRule,
    now: DateTime<Utc>,
    calendar: FixedOffset,
) -> Option<DateTime<Utc>> {
    let months = calendar_months(rule);
    let mut next = add_calendar_months(due_at, months, calendar)?;
    while next <= now {
        next = add_calendar_months(next, months, calendar)?;
    }
    Some(next)
}

fn calendar_months(rule: &RepeatRule) -> u32 {
    match rule {
        RepeatRule::Yearly => 12,
        _ => 1,
    }
}

fn add_calendar_months(
    value: DateTime<Utc>,
    months: u32,
    calendar: FixedOffset,
) -> Option<DateTime<Utc>> {
    let local = value.with_timezone(&calendar).naive_local();
    let shifted = local.checked_add_months(Months::new(months))?;
    calendar
        .from_local_datetime(&shifted)
        .single()
        .map(|value| value.with_timezone(&Utc))
}

fn utc_calendar() -> FixedOffset {
    Utc.fix()
}
