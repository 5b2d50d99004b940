use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::debts::{record_transition, visible_debt};
use super::{Effects, Ledger};
use crate::access::{require_admin, resolve_scope, Caller, Scope};
use crate::balance::BalanceChange;
use crate::decimal::Money;
use crate::entities::{Debt, NewPayment, Payment, PaymentUpdate};
use crate::errors::{LedgerError, Result};
use crate::events::{LedgerEvent, SettlementKind};
use crate::notifications::{Notification, Recipient};
use crate::reports::statistics::{payment_statistics, PaymentStatistics};
use crate::store::{LedgerRepository, LedgerStore};
use crate::types::{optional_text, require_amount, DebtId, PaymentId, PaymentMethod};

/// payments inside `scope`, newest first
pub(crate) fn scoped_payments(repo: &dyn LedgerRepository, scope: Scope) -> Vec<Payment> {
    let mut payments = match scope {
        Scope::All => repo.payments(),
        Scope::Client(client_id) => repo.payments_for_client(client_id),
    };
    newest_first(&mut payments);
    payments
}

fn newest_first(payments: &mut [Payment]) {
    payments.sort_by_key(|p| Reverse(p.payment_date));
}

/// undo a payment's effect on its debt and remove it
pub(crate) fn reverse_payment_in(
    repo: &mut dyn LedgerRepository,
    effects: &mut Effects,
    payment_id: PaymentId,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<Payment> {
    let payment = repo
        .payment(payment_id)
        .ok_or_else(|| LedgerError::not_found("payment", payment_id))?;
    let mut debt = repo
        .debt(payment.debt_id)
        .ok_or_else(|| LedgerError::not_found("debt", payment.debt_id))?;

    let change = debt.reverse_payment(payment.amount, now)?;
    repo.save_debt(debt.clone())?;
    let removed = repo.delete_payment(payment_id)?;

    effects.emit(LedgerEvent::PaymentReversed {
        payment_id,
        debt_id: debt.id,
        amount: removed.amount,
        reason,
        remaining_amount: debt.remaining_amount,
        timestamp: now,
    });
    record_transition(repo, effects, &debt, &change, SettlementKind::Payment);
    Ok(removed)
}

/// debt a payment may be applied to; an unknown or foreign debt is invalid input here
fn payable_debt(repo: &dyn LedgerRepository, caller: &Caller, debt_id: DebtId) -> Result<Debt> {
    visible_debt(repo, caller, debt_id).map_err(|err| match err {
        LedgerError::NotFound { .. } => LedgerError::validation(format!(
            "debt {} not found or not accessible",
            debt_id
        )),
        other => other,
    })
}

fn ensure_not_archived(debt: &Debt) -> Result<()> {
    if debt.archived {
        return Err(LedgerError::validation(format!("debt {} is archived", debt.id)));
    }
    Ok(())
}

impl<S: LedgerStore> Ledger<S> {
    /// Apply a payment to a debt visible to the caller.
    #[instrument(skip_all, fields(role = %caller.role, debt_id = %input.debt_id, amount = %input.amount))]
    pub fn add_payment(&self, caller: &Caller, input: NewPayment) -> Result<Payment> {
        require_amount(input.amount)?;
        let now = self.now();
        let high_payment = self.config.high_payment_threshold;
        let notes = optional_text(input.notes);

        let payment = self.commit(|repo, effects| {
            let mut debt = payable_debt(repo, caller, input.debt_id)?;
            ensure_not_archived(&debt)?;

            let change = debt.apply_payment(input.amount, now)?;
            let payment = Payment::new(debt.id, input.amount, input.payment_method, notes, now);
            repo.save_debt(debt.clone())?;
            repo.save_payment(payment.clone())?;

            effects.emit(LedgerEvent::PaymentApplied {
                payment_id: payment.id,
                debt_id: debt.id,
                client_id: debt.client_id,
                amount: payment.amount,
                method: payment.payment_method,
                remaining_amount: debt.remaining_amount,
                timestamp: now,
            });
            if let Some(client) = repo.client(debt.client_id) {
                effects.notify(Notification::PaymentReceived {
                    recipient: Recipient::client(&client),
                    payment_id: payment.id,
                    debt_id: debt.id,
                    amount: payment.amount,
                    method: payment.payment_method,
                    remaining_amount: debt.remaining_amount,
                    paid_at: payment.payment_date,
                });
                if payment.amount > high_payment {
                    effects.notify(Notification::HighPayment {
                        client_id: client.id,
                        client_name: client.name.clone(),
                        payment_id: payment.id,
                        amount: payment.amount,
                        method: payment.payment_method,
                    });
                }
            }
            record_transition(repo, effects, &debt, &change, SettlementKind::Payment);
            Ok(payment)
        })?;

        info!(payment_id = %payment.id, "applied payment");
        Ok(payment)
    }

    /// Undo a payment: give its amount back to the debt and remove it.
    #[instrument(skip_all, fields(role = %caller.role, payment_id = %payment_id))]
    pub fn reverse_payment(
        &self,
        caller: &Caller,
        payment_id: PaymentId,
        reason: Option<String>,
    ) -> Result<Payment> {
        require_admin(caller)?;
        let now = self.now();
        let reason = optional_text(reason);
        let payment = self.commit(|repo, effects| reverse_payment_in(repo, effects, payment_id, reason, now))?;
        info!(payment_id = %payment.id, amount = %payment.amount, "reversed payment");
        Ok(payment)
    }

    /// Same as [`Ledger::reverse_payment`] without a reason.
    #[instrument(skip_all, fields(role = %caller.role, payment_id = %payment_id))]
    pub fn delete_payment(&self, caller: &Caller, payment_id: PaymentId) -> Result<Payment> {
        self.reverse_payment(caller, payment_id, None)
    }

    /// Change a payment's method or notes, or its amount.
    ///
    /// An amount change backs the old amount out of the debt and applies the
    /// new one in the same transaction.
    #[instrument(skip_all, fields(role = %caller.role, payment_id = %payment_id))]
    pub fn update_payment(
        &self,
        caller: &Caller,
        payment_id: PaymentId,
        update: PaymentUpdate,
    ) -> Result<Payment> {
        require_admin(caller)?;
        let now = self.now();

        self.commit(|repo, effects| {
            let mut payment = repo
                .payment(payment_id)
                .ok_or_else(|| LedgerError::not_found("payment", payment_id))?;

            if let Some(amount) = update.amount.filter(|a| *a != payment.amount) {
                require_amount(amount)?;
                let mut debt = repo
                    .debt(payment.debt_id)
                    .ok_or_else(|| LedgerError::not_found("debt", payment.debt_id))?;
                ensure_not_archived(&debt)?;
                let before = (debt.remaining_amount, debt.status);

                debt.reverse_payment(payment.amount, now)?;
                debt.apply_payment(amount, now)?;
                repo.save_debt(debt.clone())?;

                effects.emit(LedgerEvent::PaymentAmended {
                    payment_id,
                    debt_id: debt.id,
                    old_amount: payment.amount,
                    new_amount: amount,
                    remaining_amount: debt.remaining_amount,
                    timestamp: now,
                });
                let change = BalanceChange {
                    previous_remaining: before.0,
                    remaining: debt.remaining_amount,
                    previous_status: before.1,
                    status: debt.status,
                };
                record_transition(repo, effects, &debt, &change, SettlementKind::Payment);
                payment.amount = amount;
            }

            if let Some(method) = update.payment_method {
                payment.payment_method = method;
            }
            if update.notes.is_some() {
                payment.notes = optional_text(update.notes);
            }
            repo.save_payment(payment.clone())?;
            Ok(payment)
        })
    }

    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn payments(&self, caller: &Caller) -> Result<Vec<Payment>> {
        self.read(|repo| {
            let payments = scoped_payments(repo, resolve_scope(repo, caller)?);
            debug!(count = payments.len(), "listed payments");
            Ok(payments)
        })
    }

    #[instrument(skip_all, fields(role = %caller.role, payment_id = %payment_id))]
    pub fn payment(&self, caller: &Caller, payment_id: PaymentId) -> Result<Payment> {
        self.read(|repo| {
            let scope = resolve_scope(repo, caller)?;
            repo.payment(payment_id)
                .filter(|p| {
                    repo.debt(p.debt_id)
                        .map(|d| scope.permits_debt(&d))
                        .unwrap_or(false)
                })
                .ok_or_else(|| LedgerError::not_found("payment", payment_id))
        })
    }

    /// Payments against one debt, newest first.
    #[instrument(skip_all, fields(role = %caller.role, debt_id = %debt_id))]
    pub fn payments_for_debt(&self, caller: &Caller, debt_id: DebtId) -> Result<Vec<Payment>> {
        self.read(|repo| {
            let debt = visible_debt(repo, caller, debt_id)?;
            let mut payments = repo.payments_for_debt(debt.id);
            newest_first(&mut payments);
            Ok(payments)
        })
    }

    /// Case-insensitive match on payment notes.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn search_payments(&self, caller: &Caller, term: &str) -> Result<Vec<Payment>> {
        let term = term.trim().to_string();
        self.filter_payments(caller, |p| p.notes_contain(&term))
    }

    #[instrument(skip_all, fields(role = %caller.role, method = %method))]
    pub fn payments_by_method(&self, caller: &Caller, method: PaymentMethod) -> Result<Vec<Payment>> {
        self.filter_payments(caller, |p| p.payment_method == method)
    }

    /// Payments whose amount lies within `[min, max]`.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn payments_by_amount_range(&self, caller: &Caller, min: Money, max: Money) -> Result<Vec<Payment>> {
        if min > max {
            return Err(LedgerError::validation(format!(
                "minimum {} is greater than maximum {}",
                min, max
            )));
        }
        self.filter_payments(caller, |p| p.amount >= min && p.amount <= max)
    }

    /// Latest payments; `None` uses the configured limit.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn recent_payments(&self, caller: &Caller, limit: Option<usize>) -> Result<Vec<Payment>> {
        let limit = limit.unwrap_or(self.config.recent_payments_limit);
        self.read(|repo| {
            let mut payments = scoped_payments(repo, resolve_scope(repo, caller)?);
            payments.truncate(limit);
            Ok(payments)
        })
    }

    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn payment_statistics(&self, caller: &Caller) -> Result<PaymentStatistics> {
        let now = self.now();
        let window = self.config.payment_statistics_window_months;
        self.read(|repo| {
            let payments = scoped_payments(repo, resolve_scope(repo, caller)?);
            Ok(payment_statistics(&payments, now, window))
        })
    }

    fn filter_payments<P>(&self, caller: &Caller, predicate: P) -> Result<Vec<Payment>>
    where
        P: Fn(&Payment) -> bool,
    {
        self.read(|repo| {
            let payments: Vec<Payment> = scoped_payments(repo, resolve_scope(repo, caller)?)
                .into_iter()
                .filter(|p| predicate(p))
                .collect();
            debug!(count = payments.len(), "filtered payments");
            Ok(payments)
        })
    }
}
