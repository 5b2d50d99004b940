pub mod access;
pub mod balance;
pub mod config;
pub mod decimal;
pub mod entities;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod notifications;
pub mod reports;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod testing;

// re-export key types
pub use access::{Caller, Scope};
pub use balance::{BalanceChange, BalanceDiscrepancy, DiscrepancyKind};
pub use config::LedgerConfig;
pub use decimal::{Money, Rate};
pub use entities::{
    Client, ClientUpdate, Debt, DebtUpdate, NewClient, NewDebt, NewPayment, Payment, PaymentUpdate,
    User,
};
pub use errors::{ErrorKind, LedgerError, Result};
pub use events::{EventStore, LedgerEvent, SettlementKind};
pub use ledger::{BulkItemError, BulkOperationResult, Ledger, LedgerBuilder};
pub use notifications::{
    Notification, NotificationDispatcher, Notifier, NotifyError, Recipient, RecordingNotifier,
    TracingNotifier,
};
pub use scheduler::{Cadence, Job, JobReport, Scheduler};
pub use store::{LedgerRepository, LedgerStore, MemoryStore};
pub use types::{ClientId, DebtId, DebtStatus, PaymentId, PaymentMethod, Role, UserId};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
