//! Console notifier used by the CLI host.

use chrono::SecondsFormat;
use remindkit_core::{Notification, NotificationPermission, Notifier, NotifyError};

/// Prints each alert as one line on stdout.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    permission: NotificationPermission,
}

impl ConsoleNotifier {
    pub fn new(permission: NotificationPermission) -> Self {
        Self { permission }
    }
}

impl Notifier for ConsoleNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if !self.permission.is_granted() {
            return Err(NotifyError::PermissionDenied);
        }
        let due = notification
            .due_at
            .map(|due| format!(" (due {})", due.to_rfc3339_opts(SecondsFormat::Secs, true)))
            .unwrap_or_default();
        match &notification.body {
            Some(body) => println!("🔔 {}{due}: {body}", notification.title),
            None => println!("🔔 {}{due}", notification.title),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ConsoleNotifier;
    use remindkit_core::{Notification, NotificationPermission, Notifier, NotifyError};

    #[test]
    fn refuses_delivery_without_permission() {
        let notifier = ConsoleNotifier::new(NotificationPermission::Denied);
        let err = notifier
            .notify(&Notification::ad_hoc("test", None))
            .unwrap_err();
        assert!(matches!(err, NotifyError::PermissionDenied));
    }

    #[test]
    fn delivers_when_granted() {
        let notifier = ConsoleNotifier::new(NotificationPermission::Granted);
        notifier
            .notify(&Notification::ad_hoc("test", Some("body".to_string())))
            .unwrap();
    }
}
