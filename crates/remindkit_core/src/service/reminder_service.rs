//! Reminder use-case service.
//!
//! # Responsibility
//! - Provide create/list/get/delete entry points for reminder callers.
//! - Reject invalid definitions before they reach the store.
//!
//! # Invariants
//! - New reminders start un-notified with `revision = 0`.
//! - Service APIs never bypass store validation/persistence contracts.
//! - The service never advances `due_at`; only the coordinator does.

use crate::model::reminder::{Reminder, ReminderId, ReminderState, RepeatRule};
use crate::repo::reminder_repo::{RepoResult, ReminderStore};
use chrono::{DateTime, Utc};

/// Request model for creating a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReminderRequest {
    pub name: String,
    pub description: Option<String>,
    pub due_at: DateTime<Utc>,
    pub repeat_rule: RepeatRule,
}

/// Reminder paired with its delivery state at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderView {
    pub reminder: Reminder,
    pub state: ReminderState,
}

/// Use-case service wrapper for reminder CRUD.
pub struct ReminderService<S: ReminderStore> {
    store: S,
}

impl<S: ReminderStore> ReminderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates and persists a new reminder.
    ///
    /// # Errors
    /// - `RepoError::Validation` for an empty name or a zero custom interval.
    pub fn create_reminder(&self, request: CreateReminderRequest) -> RepoResult<Reminder> {
        let reminder = Reminder::new(
            request.name,
            request.description,
            request.due_at,
            request.repeat_rule,
        );
        reminder.validate()?;
        self.store.create_reminder(&reminder)?;
        Ok(reminder)
    }

    pub fn get_reminder(&self, id: ReminderId) -> RepoResult<Option<Reminder>> {
        self.store.get_reminder(id, false)
    }

    /// Lists active reminders ordered by due time.
    pub fn list_reminders(&self) -> RepoResult<Vec<Reminder>> {
        self.store.load()
    }

    /// Lists active reminders with their derived state at `now`.
    pub fn list_with_state(&self, now: DateTime<Utc>) -> RepoResult<Vec<ReminderView>> {
        Ok(self
            .store
            .load()?
            .into_iter()
            .map(|reminder| {
                let state = reminder.state_at(now);
                ReminderView { reminder, state }
            })
            .collect())
    }

    /// Removes a reminder. It stops firing on every poller's next tick.
    pub fn delete_reminder(&mut self, id: ReminderId) -> RepoResult<()> {
        self.store.soft_delete_reminder(id)
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
