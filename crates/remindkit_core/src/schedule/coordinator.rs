//! Delivery coordinator: one poll tick over the reminder store.
//!
//! # Responsibility
//! - Find reminders whose occurrence is owed at `now`.
//! - Emit one notification per owed occurrence and advance the record.
//! - Persist the updated collection when anything changed.
//!
//! # Invariants
//! - A tick where nothing is owed performs no writes and no deliveries.
//! - A failed delivery never keeps a reminder in the owed state.
//! - Without notification permission the tick is skipped entirely, so owed
//!   reminders are flushed on the first tick after permission is granted.
//! - Every fire step bumps `revision` by one.

use crate::model::reminder::{Reminder, ReminderId, ReminderState};
use crate::notify::{Notification, NotificationPermission, Notifier};
use crate::repo::reminder_repo::{RepoError, ReminderStore, SaveSummary};
use crate::schedule::clock::Clock;
use crate::schedule::recurrence::next_due_at_in;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[derive(Debug)]
pub enum CoordinatorError {
    Repo(RepoError),
}

impl Display for CoordinatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "reminder store failed during poll: {err}"),
        }
    }
}

impl Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for CoordinatorError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// One reminder handled by a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredReminder {
    pub id: ReminderId,
    /// Occurrence that was owed.
    pub occurrence: DateTime<Utc>,
    /// New due time for repeating reminders; `None` once inert.
    pub next_due_at: Option<DateTime<Utc>>,
    /// Whether the notifier accepted the alert.
    pub delivered: bool,
}

/// Summary of one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub now: DateTime<Utc>,
    /// Active reminders inspected.
    pub checked: usize,
    /// Reminders owed at `now` before the tick ran.
    pub owed: usize,
    pub fired: Vec<FiredReminder>,
    pub delivery_failures: usize,
    /// Set when owed reminders were left in place for lack of permission.
    pub permission_blocked: bool,
    pub permission: Option<NotificationPermission>,
    /// Write outcome; `None` when the tick changed nothing.
    pub persisted: Option<SaveSummary>,
}

impl PollReport {
    fn empty(now: DateTime<Utc>, checked: usize) -> Self {
        Self {
            now,
            checked,
            owed: 0,
            fired: Vec::new(),
            delivery_failures: 0,
            permission_blocked: false,
            permission: None,
            persisted: None,
        }
    }

    /// Returns whether this tick left the store untouched.
    pub fn is_noop(&self) -> bool {
        self.fired.is_empty()
    }
}

/// Polls a reminder store and delivers owed notifications.
pub struct DeliveryCoordinator<S, N> {
    store: S,
    notifier: N,
    calendar: FixedOffset,
    /// Whether the previous tick with owed reminders was skipped for permission.
    blocked: bool,
}

impl<S: ReminderStore, N: Notifier> DeliveryCoordinator<S, N> {
    /// Creates a coordinator evaluating calendar rules in UTC.
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier,
            calendar: Utc.fix(),
            blocked: false,
        }
    }

    /// Evaluates monthly/yearly rules in the given fixed offset.
    pub fn with_calendar(mut self, calendar: FixedOffset) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Runs one tick at the clock's current time.
    pub fn poll(&mut self, clock: &impl Clock) -> CoordinatorResult<PollReport> {
        self.poll_at(clock.now())
    }

    /// Runs one tick at `now`.
    ///
    /// # Errors
    /// - Returns `CoordinatorError::Repo` when loading or saving fails. No
    ///   notification is lost to a failed load; a failed save means the same
    ///   occurrences are owed again on the next tick.
    pub fn poll_at(&mut self, now: DateTime<Utc>) -> CoordinatorResult<PollReport> {
        let started_at = Instant::now();
        let mut reminders = match self.store.load() {
            Ok(reminders) => reminders,
            Err(err) => {
                error!(
                    "event=poll_tick module=schedule status=error error_code=load_failed error={}",
                    err
                );
                return Err(err.into());
            }
        };

        let mut report = PollReport::empty(now, reminders.len());
        report.owed = reminders
            .iter()
            .filter(|reminder| reminder.state_at(now) == ReminderState::Owed)
            .count();
        if report.owed == 0 {
            debug!(
                "event=poll_tick module=schedule status=ok checked={} owed=0",
                report.checked
            );
            return Ok(report);
        }

        let permission = self.notifier.permission();
        report.permission = Some(permission);
        if !permission.is_granted() {
            report.permission_blocked = true;
            if self.blocked {
                debug!(
                    "event=poll_tick module=schedule status=skip reason=permission_{} owed={}",
                    permission.as_str(),
                    report.owed
                );
            } else {
                warn!(
                    "event=poll_tick module=schedule status=skip reason=permission_{} owed={}",
                    permission.as_str(),
                    report.owed
                );
            }
            self.blocked = true;
            return Ok(report);
        }
        if self.blocked {
            info!(
                "event=permission_restored module=schedule status=ok owed={}",
                report.owed
            );
            self.blocked = false;
        }

        for reminder in reminders
            .iter_mut()
            .filter(|reminder| reminder.state_at(now) == ReminderState::Owed)
        {
            let occurrence = reminder.due_at;
            let delivered = match self.notifier.notify(&notification_for(reminder)) {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        "event=notify module=schedule status=error reminder_id={} error={}",
                        reminder.id, err
                    );
                    report.delivery_failures += 1;
                    false
                }
            };
            let next_due_at = fire_step(reminder, now, self.calendar);
            report.fired.push(FiredReminder {
                id: reminder.id,
                occurrence,
                next_due_at,
                delivered,
            });
        }

        let summary = match self.store.save(&reminders) {
            Ok(summary) => summary,
            Err(err) => {
                error!(
                    "event=poll_tick module=schedule status=error error_code=save_failed fired={} error={}",
                    report.fired.len(),
                    err
                );
                return Err(err.into());
            }
        };
        report.persisted = Some(summary);

        info!(
            "event=poll_tick module=schedule status=ok checked={} owed={} fired={} failures={} applied={} skipped={} duration_ms={}",
            report.checked,
            report.owed,
            report.fired.len(),
            report.delivery_failures,
            summary.applied,
            summary.skipped,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}

/// Advances one owed reminder past `now`.
///
/// Repeating reminders get the next occurrence strictly after `now` and stay
/// un-notified; one-shot reminders become inert. A rule whose next
/// occurrence cannot be represented is also made inert so it cannot re-fire
/// on every tick.
pub fn fire_step(
    reminder: &mut Reminder,
    now: DateTime<Utc>,
    calendar: FixedOffset,
) -> Option<DateTime<Utc>> {
    reminder.revision += 1;
    match next_due_at_in(reminder.due_at, &reminder.repeat_rule, now, calendar) {
        Ok(Some(next)) => {
            reminder.due_at = next;
            reminder.notified = false;
            Some(next)
        }
        Ok(None) => {
            reminder.notified = true;
            None
        }
        Err(err) => {
            warn!(
                "event=reschedule module=schedule status=error reminder_id={} error={}",
                reminder.id, err
            );
            reminder.notified = true;
            None
        }
    }
}

fn notification_for(reminder: &Reminder) -> Notification {
    Notification {
        title: reminder.name.clone(),
        body: reminder.description.clone(),
        reminder_id: Some(reminder.id),
        due_at: Some(reminder.due_at),
    }
}
