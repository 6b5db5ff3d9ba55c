//! In-process notifier that records every delivered alert.
//!
//! Clones share state, so a caller can keep one handle while the coordinator
//! owns another.

use super::{Notification, NotificationPermission, Notifier, NotifyError};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryNotifierState {
    permission: NotificationPermission,
    fail_deliveries: bool,
    delivered: Vec<Notification>,
    failed_attempts: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    state: Arc<Mutex<MemoryNotifierState>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permission(permission: NotificationPermission) -> Self {
        let notifier = Self::default();
        notifier.set_permission(permission);
        notifier
    }

    pub fn set_permission(&self, permission: NotificationPermission) {
        self.lock().permission = permission;
    }

    /// Makes every following `notify` call fail with a backend error.
    pub fn set_fail_deliveries(&self, fail: bool) {
        self.lock().fail_deliveries = fail;
    }

    /// Returns a snapshot of successfully delivered alerts.
    pub fn delivered(&self) -> Vec<Notification> {
        self.lock().delivered.clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.lock().delivered.len()
    }

    pub fn failed_attempts(&self) -> usize {
        self.lock().failed_attempts
    }

    fn lock(&self) -> MutexGuard<'_, MemoryNotifierState> {
        // Recorded data stays readable after a poisoning panic.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for MemoryNotifier {
    fn permission(&self) -> NotificationPermission {
        self.lock().permission
    }

    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut state = self.lock();
        if !state.permission.is_granted() {
            state.failed_attempts += 1;
            return Err(NotifyError::PermissionDenied);
        }
        if state.fail_deliveries {
            state.failed_attempts += 1;
            return Err(NotifyError::Backend("simulated delivery failure".to_string()));
        }
        state.delivered.push(notification.clone());
        Ok(())
    }
}
