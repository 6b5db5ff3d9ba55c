//! Core reminder scheduling for RemindKit.
//! This crate is the single source of truth for reminder invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod schedule;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::counter::{CountdownParts, CounterId, TimeCounter};
pub use model::reminder::{
    CustomUnit, Reminder, ReminderId, ReminderState, ReminderValidationError, RepeatRule,
};
pub use notify::{MemoryNotifier, Notification, NotificationPermission, Notifier, NotifyError};
pub use repo::preference_repo::{PreferenceRepository, SqlitePreferenceRepository};
pub use repo::reminder_repo::{
    RepoError, RepoResult, ReminderStore, SaveSummary, SqliteReminderStore,
};
pub use schedule::clock::{Clock, ManualClock, SystemClock};
pub use schedule::coordinator::{DeliveryCoordinator, FiredReminder, PollReport};
pub use schedule::recurrence::{next_due_at, next_due_at_in, RecurrenceError};
pub use schedule::scheduler::{ReminderScheduler, SchedulerError};
pub use service::counter_service::{CounterBoard, CounterService, CounterServiceError};
pub use service::reminder_service::{CreateReminderRequest, ReminderService, ReminderView};
