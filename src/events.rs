use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ClientId, DebtId, PaymentId, PaymentMethod, UserId};

/// how a debt reached settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementKind {
    /// payments covered the total
    Payment,
    /// administrative bulk settlement
    Override,
}

/// all events emitted by committed ledger mutations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    // identity events
    AdminCreated {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },

    // client events
    ClientRegistered {
        client_id: ClientId,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    ClientUpdated {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },
    ClientArchived {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },
    ClientRestored {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },

    // debt events
    DebtCreated {
        debt_id: DebtId,
        client_id: ClientId,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
    DebtUpdated {
        debt_id: DebtId,
        total_amount: Money,
        remaining_amount: Money,
        timestamp: DateTime<Utc>,
    },
    DebtArchived {
        debt_id: DebtId,
        timestamp: DateTime<Utc>,
    },
    DebtRestored {
        debt_id: DebtId,
        timestamp: DateTime<Utc>,
    },
    DebtDeleted {
        debt_id: DebtId,
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },
    DebtSettled {
        debt_id: DebtId,
        client_id: ClientId,
        kind: SettlementKind,
        timestamp: DateTime<Utc>,
    },
    DebtReopened {
        debt_id: DebtId,
        client_id: ClientId,
        remaining_amount: Money,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentApplied {
        payment_id: PaymentId,
        debt_id: DebtId,
        client_id: ClientId,
        amount: Money,
        method: PaymentMethod,
        remaining_amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentAmended {
        payment_id: PaymentId,
        debt_id: DebtId,
        old_amount: Money,
        new_amount: Money,
        remaining_amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentReversed {
        payment_id: PaymentId,
        debt_id: DebtId,
        amount: Money,
        reason: Option<String>,
        remaining_amount: Money,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<LedgerEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = LedgerEvent>) {
        self.events.extend(events);
    }
}
