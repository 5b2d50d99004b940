//! Debt balance rule.
//!
//! For every debt, `remaining = total - sum(applied payments)` clamped to
//! `[0, total]`, and the status is `Settled` exactly when `remaining` is zero.
//! Everything that moves a remaining amount goes through [`apply`] or
//! [`reverse`], which are exact inverses of each other.

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::entities::{Debt, Payment};
use crate::errors::{LedgerError, Result};
use crate::types::{DebtId, DebtStatus};

/// effect of applying or reversing an amount on a debt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub previous_remaining: Money,
    pub remaining: Money,
    pub previous_status: DebtStatus,
    pub status: DebtStatus,
}

impl BalanceChange {
    /// debt went from active to settled
    pub fn settled(&self) -> bool {
        self.previous_status == DebtStatus::Active && self.status == DebtStatus::Settled
    }

    /// debt went from settled back to active
    pub fn reopened(&self) -> bool {
        self.previous_status == DebtStatus::Settled && self.status == DebtStatus::Active
    }
}

/// status implied by a remaining amount
pub fn derive_status(remaining: Money) -> DebtStatus {
    if remaining.is_positive() {
        DebtStatus::Active
    } else {
        DebtStatus::Settled
    }
}

/// remaining amount implied by a total and the payments applied against it
pub fn remaining_after<I>(total: Money, applied: I) -> Money
where
    I: IntoIterator<Item = Money>,
{
    let paid: Money = applied.into_iter().sum();
    (total - paid).clamp_to(Money::ZERO, total)
}

/// apply a payment amount
pub fn apply(total: Money, remaining: Money, amount: Money) -> Result<BalanceChange> {
    if !amount.is_positive() {
        return Err(LedgerError::non_positive_amount(amount));
    }

    let previous_status = derive_status(remaining);
    if previous_status == DebtStatus::Settled {
        return Err(LedgerError::debt_not_payable(previous_status));
    }

    if amount > remaining {
        return Err(LedgerError::exceeds_remaining(remaining, amount));
    }

    let next = (remaining - amount).clamp_to(Money::ZERO, total);
    Ok(BalanceChange {
        previous_remaining: remaining,
        remaining: next,
        previous_status,
        status: derive_status(next),
    })
}

/// undo a previously applied payment amount
pub fn reverse(total: Money, remaining: Money, amount: Money) -> Result<BalanceChange> {
    if !amount.is_positive() {
        return Err(LedgerError::non_positive_amount(amount));
    }

    let next = (remaining + amount).clamp_to(Money::ZERO, total);
    Ok(BalanceChange {
        previous_remaining: remaining,
        remaining: next,
        previous_status: derive_status(remaining),
        status: derive_status(next),
    })
}

/// why a stored balance disagrees with its payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    /// part of the balance was written off by an administrative settlement
    SettlementOverride,
    /// remaining amount does not match total minus payments
    RemainingMismatch,
    /// status does not match the remaining amount
    StatusMismatch,
}

/// a debt whose stored balance breaks the balance rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDiscrepancy {
    pub debt_id: DebtId,
    pub kind: DiscrepancyKind,
    pub stored_remaining: Money,
    pub expected_remaining: Money,
    pub stored_status: DebtStatus,
    pub expected_status: DebtStatus,
}

/// compare a debt's stored balance against its applied payments
pub fn reconcile(debt: &Debt, payments: &[Payment]) -> Option<BalanceDiscrepancy> {
    let expected_remaining = remaining_after(
        debt.total_amount,
        payments
            .iter()
            .filter(|p| p.debt_id == debt.id)
            .map(|p| p.amount),
    );
    let expected_status = derive_status(expected_remaining);

    let kind = if debt.remaining_amount != expected_remaining {
        if debt.settled_by_override && debt.remaining_amount < expected_remaining {
            DiscrepancyKind::SettlementOverride
        } else {
            DiscrepancyKind::RemainingMismatch
        }
    } else if debt.status != expected_status {
        DiscrepancyKind::StatusMismatch
    } else {
        return None;
    };

    Some(BalanceDiscrepancy {
        debt_id: debt.id,
        kind,
        stored_remaining: debt.remaining_amount,
        expected_remaining,
        stored_status: debt.status,
        expected_status,
    })
}
