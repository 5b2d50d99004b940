use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance::{self, BalanceChange};
use crate::decimal::Money;
use crate::errors::Result;
use crate::types::{ClientId, DebtId, DebtStatus};

/// an obligation owed by one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub id: DebtId,
    pub client_id: ClientId,
    pub total_amount: Money,
    pub remaining_amount: Money,
    pub status: DebtStatus,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub archived: bool,
    /// set once an administrative settlement wrote off part of the balance
    pub settled_by_override: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    /// new active debt with nothing paid yet
    pub fn new(
        client_id: ClientId,
        total_amount: Money,
        description: String,
        due_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            total_amount,
            remaining_amount: total_amount,
            status: DebtStatus::Active,
            description,
            due_date,
            archived: false,
            settled_by_override: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DebtStatus::Active
    }

    /// active with money still owed
    pub fn is_outstanding(&self) -> bool {
        self.is_active() && self.remaining_amount.is_positive()
    }

    /// amount covered so far
    pub fn paid_amount(&self) -> Money {
        self.total_amount - self.remaining_amount
    }

    /// active debt whose due date has passed
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_active() && self.due_date.map(|due| due < today).unwrap_or(false)
    }

    /// record a payment against the remaining amount
    pub fn apply_payment(&mut self, amount: Money, now: DateTime<Utc>) -> Result<BalanceChange> {
        let change = balance::apply(self.total_amount, self.remaining_amount, amount)?;
        self.set_balance(&change, now);
        Ok(change)
    }

    /// give a payment's amount back to the remaining amount
    pub fn reverse_payment(&mut self, amount: Money, now: DateTime<Utc>) -> Result<BalanceChange> {
        let change = balance::reverse(self.total_amount, self.remaining_amount, amount)?;
        self.set_balance(&change, now);
        Ok(change)
    }

    /// administrative settlement, independent of payments
    pub fn force_settle(&mut self, now: DateTime<Utc>) -> BalanceChange {
        let change = BalanceChange {
            previous_remaining: self.remaining_amount,
            remaining: Money::ZERO,
            previous_status: self.status,
            status: DebtStatus::Settled,
        };
        if self.remaining_amount.is_positive() {
            self.settled_by_override = true;
        }
        self.remaining_amount = Money::ZERO;
        self.status = DebtStatus::Settled;
        self.updated_at = now;
        change
    }

    fn set_balance(&mut self, change: &BalanceChange, now: DateTime<Utc>) {
        self.remaining_amount = change.remaining;
        self.status = change.status;
        self.updated_at = now;
    }
}

/// input for creating a debt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDebt {
    pub client_id: ClientId,
    pub total_amount: Money,
    pub description: String,
    pub due_date: Option<NaiveDate>,
}

impl NewDebt {
    pub fn new(client_id: ClientId, total_amount: Money, description: impl Into<String>) -> Self {
        Self {
            client_id,
            total_amount,
            description: description.into(),
            due_date: None,
        }
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// partial update of a debt; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtUpdate {
    pub client_id: Option<ClientId>,
    pub total_amount: Option<Money>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}
