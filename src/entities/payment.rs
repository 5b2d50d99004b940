use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{DebtId, PaymentId, PaymentMethod};

/// money applied against a debt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub debt_id: DebtId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        debt_id: DebtId,
        amount: Money,
        payment_method: PaymentMethod,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            debt_id,
            amount,
            payment_method,
            notes,
            payment_date: now,
            created_at: now,
        }
    }

    /// case-insensitive match on notes
    pub fn notes_contain(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.notes
            .as_deref()
            .map(|n| n.to_lowercase().contains(&needle))
            .unwrap_or(false)
    }
}

/// input for applying a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub debt_id: DebtId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn new(debt_id: DebtId, amount: Money, payment_method: PaymentMethod) -> Self {
        Self {
            debt_id,
            amount,
            payment_method,
            notes: None,
        }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// change to an existing payment; an amount change is recalculated against the debt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub amount: Option<Money>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}
