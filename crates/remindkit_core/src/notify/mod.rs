//! Notification capability consumed by the delivery coordinator.
//!
//! # Responsibility
//! - Define the one-shot "show an alert" capability hosts must provide.
//! - Expose permission state so callers can skip delivery without failing.
//!
//! # Invariants
//! - Delivery is fire-and-forget; there is no acknowledgement channel.
//! - A missing permission is not an error condition for core callers.

use crate::model::reminder::ReminderId;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

mod memory;

pub use memory::MemoryNotifier;

/// Host-level permission to display notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPermission {
    #[default]
    Granted,
    Denied,
    /// The user has not decided yet.
    Prompt,
}

impl NotificationPermission {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Prompt => "prompt",
        }
    }
}

impl FromStr for NotificationPermission {
    type Err = NotifyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(Self::Granted),
            "denied" => Ok(Self::Denied),
            "prompt" | "default" => Ok(Self::Prompt),
            other => Err(NotifyError::Backend(format!(
                "unknown notification permission `{other}`"
            ))),
        }
    }
}

/// One alert to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: Option<String>,
    /// Reminder that produced this alert; `None` for ad-hoc alerts.
    pub reminder_id: Option<ReminderId>,
    /// Occurrence being announced.
    pub due_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Builds an ad-hoc alert not tied to a reminder.
    pub fn ad_hoc(title: impl Into<String>, body: Option<String>) -> Self {
        Self {
            title: title.into(),
            body,
            reminder_id: None,
            due_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    PermissionDenied,
    Backend(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "notification permission is not granted"),
            Self::Backend(message) => write!(f, "notification backend failed: {message}"),
        }
    }
}

impl Error for NotifyError {}

/// Notification capability implemented by the host.
pub trait Notifier {
    /// Current permission state; queried before every delivery batch.
    fn permission(&self) -> NotificationPermission;
    /// Displays one alert.
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn permission(&self) -> NotificationPermission {
        (**self).permission()
    }

    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).notify(notification)
    }
}
