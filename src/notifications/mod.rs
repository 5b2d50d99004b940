//! Best-effort outbound notifications.
//!
//! A [`Notifier`] only receives notifications for mutations that already
//! committed. Delivery failures stay inside this module as [`NotifyError`].

mod dispatch;
mod notifiers;

pub use dispatch::NotificationDispatcher;
pub use notifiers::{RecordingNotifier, TracingNotifier};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::Money;
use crate::entities::Client;
use crate::reports::MethodTotal;
use crate::types::{ClientId, DebtId, PaymentId, PaymentMethod};

/// who a notification is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    Client {
        client_id: ClientId,
        name: String,
        phone: String,
        email: Option<String>,
    },
    Administrators,
}

impl Recipient {
    pub fn client(client: &Client) -> Self {
        Recipient::Client {
            client_id: client.id,
            name: client.name.clone(),
            phone: client.phone.clone(),
            email: client.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    PaymentReceived {
        recipient: Recipient,
        payment_id: PaymentId,
        debt_id: DebtId,
        amount: Money,
        method: PaymentMethod,
        remaining_amount: Money,
        paid_at: DateTime<Utc>,
    },
    /// payment above the configured threshold; goes to administrators
    HighPayment {
        client_id: ClientId,
        client_name: String,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
    },
    DebtSettled {
        recipient: Recipient,
        debt_id: DebtId,
        description: String,
        total_amount: Money,
    },
    NewClient {
        client_id: ClientId,
        name: String,
        phone: String,
        email: Option<String>,
    },
    DebtOverdue {
        recipient: Recipient,
        debt_id: DebtId,
        description: String,
        remaining_amount: Money,
        due_date: NaiveDate,
    },
    PaymentReminder {
        recipient: Recipient,
        active_debts: usize,
        outstanding: Money,
    },
    MonthlySummary {
        period_start: NaiveDate,
        period_end: NaiveDate,
        payment_count: usize,
        total_revenue: Money,
        average_payment: Money,
        by_method: Vec<MethodTotal>,
    },
    DailyRevenue {
        date: NaiveDate,
        payment_count: usize,
        total_revenue: Money,
        average_payment: Money,
    },
}

impl Notification {
    pub fn recipient(&self) -> Recipient {
        match self {
            Notification::PaymentReceived { recipient, .. }
            | Notification::DebtSettled { recipient, .. }
            | Notification::DebtOverdue { recipient, .. }
            | Notification::PaymentReminder { recipient, .. } => recipient.clone(),
            Notification::HighPayment { .. }
            | Notification::NewClient { .. }
            | Notification::MonthlySummary { .. }
            | Notification::DailyRevenue { .. } => Recipient::Administrators,
        }
    }

    /// stable short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::PaymentReceived { .. } => "payment_received",
            Notification::HighPayment { .. } => "high_payment",
            Notification::DebtSettled { .. } => "debt_settled",
            Notification::NewClient { .. } => "new_client",
            Notification::DebtOverdue { .. } => "debt_overdue",
            Notification::PaymentReminder { .. } => "payment_reminder",
            Notification::MonthlySummary { .. } => "monthly_summary",
            Notification::DailyRevenue { .. } => "daily_revenue",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Unavailable(String),

    #[error("notification rejected for {recipient}: {reason}")]
    Rejected { recipient: String, reason: String },

    #[error("failed to encode notification: {0}")]
    Encoding(String),
}

/// outbound channel for notifications
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_admin_addressed_kinds() {
        let high = Notification::HighPayment {
            client_id: Uuid::new_v4(),
            client_name: "Lu".to_string(),
            payment_id: Uuid::new_v4(),
            amount: Money::from_major(1500),
            method: PaymentMethod::Card,
        };
        assert_eq!(high.recipient(), Recipient::Administrators);
        assert_eq!(high.kind(), "high_payment");

        let recipient = Recipient::Client {
            client_id: Uuid::new_v4(),
            name: "Lu".to_string(),
            phone: "+15550100".to_string(),
            email: None,
        };
        let reminder = Notification::PaymentReminder {
            recipient: recipient.clone(),
            active_debts: 2,
            outstanding: Money::from_major(80),
        };
        assert_eq!(reminder.recipient(), recipient);
    }
}
