use parking_lot::Mutex;

use super::{Notification, Notifier, NotifyError, Recipient};

/// writes each notification as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| NotifyError::Encoding(e.to_string()))?;
        let recipient = match notification.recipient() {
            Recipient::Client { phone, .. } => phone,
            Recipient::Administrators => "administrators".to_string(),
        };
        tracing::info!(
            kind = notification.kind(),
            recipient = %recipient,
            payload = %payload,
            "notification sent"
        );
        Ok(())
    }
}

/// keeps every delivered notification in memory; can be switched to fail
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// make every following send fail with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failing.lock() = Some(reason.into());
    }

    pub fn recover(&self) {
        *self.failing.lock() = None;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn count(&self, kind: &str) -> usize {
        self.sent.lock().iter().filter(|n| n.kind() == kind).count()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Some(reason) = self.failing.lock().clone() {
            return Err(NotifyError::Unavailable(reason));
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
