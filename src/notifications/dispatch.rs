use std::sync::Arc;

use super::{Notification, Notifier};

/// fans committed notifications out to a notifier, never failing the caller
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// send each notification; returns how many were delivered
    pub fn dispatch(&self, notifications: &[Notification]) -> usize {
        let mut delivered = 0;
        for notification in notifications {
            match self.notifier.send(notification) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    tracing::warn!(
                        kind = notification.kind(),
                        %error,
                        "notification delivery failed"
                    );
                }
            }
        }
        delivered
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::RecordingNotifier;
    use uuid::Uuid;

    #[test]
    fn test_failures_are_swallowed() {
        let recorder = Arc::new(RecordingNotifier::new());
        let dispatcher = NotificationDispatcher::new(recorder.clone());
        let notification = Notification::NewClient {
            client_id: Uuid::new_v4(),
            name: "Iris".to_string(),
            phone: "+15550123".to_string(),
            email: None,
        };

        assert_eq!(dispatcher.dispatch(std::slice::from_ref(&notification)), 1);

        recorder.fail_with("offline");
        assert_eq!(dispatcher.dispatch(&[notification.clone(), notification]), 0);
        assert_eq!(recorder.sent().len(), 1);
    }
}
