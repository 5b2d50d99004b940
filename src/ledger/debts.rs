use std::cmp::Reverse;

use tracing::{debug, info, instrument};

use super::{Effects, Ledger};
use crate::access::{require_admin, resolve_scope, Caller, Scope};
use crate::balance::{derive_status, BalanceChange};
use crate::decimal::Money;
use crate::entities::{Debt, DebtUpdate, NewDebt};
use crate::errors::{LedgerError, Result};
use crate::events::{LedgerEvent, SettlementKind};
use crate::notifications::{Notification, Recipient};
use crate::reports::statistics::{debt_statistics, DebtStatistics};
use crate::store::{LedgerRepository, LedgerStore};
use crate::types::{require_amount, require_text, DebtId, DebtStatus};

/// non-archived debts inside `scope`
pub(crate) fn scoped_debts(repo: &dyn LedgerRepository, scope: Scope) -> Vec<Debt> {
    let debts = match scope {
        Scope::All => repo.debts(),
        Scope::Client(client_id) => repo.debts_for_client(client_id),
    };
    debts.into_iter().filter(|d| !d.archived).collect()
}

/// debt visible to `caller`, or NotFound
pub(crate) fn visible_debt(repo: &dyn LedgerRepository, caller: &Caller, debt_id: DebtId) -> Result<Debt> {
    let scope = resolve_scope(repo, caller)?;
    repo.debt(debt_id)
        .filter(|d| scope.permits_debt(d))
        .ok_or_else(|| LedgerError::not_found("debt", debt_id))
}

/// events and notifications for a status flip caused by a balance change
pub(crate) fn record_transition(
    repo: &dyn LedgerRepository,
    effects: &mut Effects,
    debt: &Debt,
    change: &BalanceChange,
    kind: SettlementKind,
) {
    let timestamp = debt.updated_at;
    if change.settled() {
        effects.emit(LedgerEvent::DebtSettled {
            debt_id: debt.id,
            client_id: debt.client_id,
            kind,
            timestamp,
        });
        if let Some(client) = repo.client(debt.client_id) {
            effects.notify(Notification::DebtSettled {
                recipient: Recipient::client(&client),
                debt_id: debt.id,
                description: debt.description.clone(),
                total_amount: debt.total_amount,
            });
        }
    } else if change.reopened() {
        effects.emit(LedgerEvent::DebtReopened {
            debt_id: debt.id,
            client_id: debt.client_id,
            remaining_amount: debt.remaining_amount,
            timestamp,
        });
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Open a new debt for an existing client.
    #[instrument(skip_all, fields(role = %caller.role, client_id = %input.client_id))]
    pub fn create_debt(&self, caller: &Caller, input: NewDebt) -> Result<Debt> {
        require_admin(caller)?;
        require_amount(input.total_amount)?;
        let description = require_text("description", &input.description)?;
        let now = self.now();

        let debt = self.commit(|repo, effects| {
            if repo.client(input.client_id).is_none() {
                return Err(LedgerError::validation(format!(
                    "client {} does not exist",
                    input.client_id
                )));
            }

            let debt = Debt::new(input.client_id, input.total_amount, description, input.due_date, now);
            repo.save_debt(debt.clone())?;
            effects.emit(LedgerEvent::DebtCreated {
                debt_id: debt.id,
                client_id: debt.client_id,
                total_amount: debt.total_amount,
                timestamp: now,
            });
            Ok(debt)
        })?;

        info!(debt_id = %debt.id, total = %debt.total_amount, "created debt");
        Ok(debt)
    }

    /// Edit a debt. A new total moves the remaining amount by the same delta.
    #[instrument(skip_all, fields(role = %caller.role, debt_id = %debt_id))]
    pub fn update_debt(&self, caller: &Caller, debt_id: DebtId, update: DebtUpdate) -> Result<Debt> {
        require_admin(caller)?;
        if let Some(total) = update.total_amount {
            require_amount(total)?;
        }
        let description = update
            .description
            .as_deref()
            .map(|d| require_text("description", d))
            .transpose()?;
        let now = self.now();

        self.commit(|repo, effects| {
            let mut debt = repo
                .debt(debt_id)
                .ok_or_else(|| LedgerError::not_found("debt", debt_id))?;

            if let Some(client_id) = update.client_id {
                if repo.client(client_id).is_none() {
                    return Err(LedgerError::validation(format!(
                        "client {} does not exist",
                        client_id
                    )));
                }
                debt.client_id = client_id;
            }
            if let Some(description) = description {
                debt.description = description;
            }
            if update.due_date.is_some() {
                debt.due_date = update.due_date;
            }

            let before = BalanceChange {
                previous_remaining: debt.remaining_amount,
                remaining: debt.remaining_amount,
                previous_status: debt.status,
                status: debt.status,
            };
            if let Some(total) = update.total_amount {
                let remaining = debt.remaining_amount + (total - debt.total_amount);
                if remaining.is_negative() {
                    return Err(LedgerError::validation(format!(
                        "total {} is below the {} already paid",
                        total,
                        debt.paid_amount()
                    )));
                }
                debt.total_amount = total;
                debt.remaining_amount = remaining;
                debt.status = derive_status(remaining);
            }
            debt.updated_at = now;
            repo.save_debt(debt.clone())?;

            let change = BalanceChange {
                remaining: debt.remaining_amount,
                status: debt.status,
                ..before
            };
            effects.emit(LedgerEvent::DebtUpdated {
                debt_id,
                total_amount: debt.total_amount,
                remaining_amount: debt.remaining_amount,
                timestamp: now,
            });
            record_transition(repo, effects, &debt, &change, SettlementKind::Payment);
            Ok(debt)
        })
    }

    #[instrument(skip_all, fields(role = %caller.role, debt_id = %debt_id))]
    pub fn archive_debt(&self, caller: &Caller, debt_id: DebtId) -> Result<Debt> {
        self.set_debt_archived(caller, debt_id, true)
    }

    #[instrument(skip_all, fields(role = %caller.role, debt_id = %debt_id))]
    pub fn unarchive_debt(&self, caller: &Caller, debt_id: DebtId) -> Result<Debt> {
        self.set_debt_archived(caller, debt_id, false)
    }

    fn set_debt_archived(&self, caller: &Caller, debt_id: DebtId, archived: bool) -> Result<Debt> {
        require_admin(caller)?;
        let now = self.now();
        self.commit(|repo, effects| {
            let mut debt = repo
                .debt(debt_id)
                .ok_or_else(|| LedgerError::not_found("debt", debt_id))?;
            debt.archived = archived;
            debt.updated_at = now;
            repo.save_debt(debt.clone())?;
            effects.emit(if archived {
                LedgerEvent::DebtArchived { debt_id, timestamp: now }
            } else {
                LedgerEvent::DebtRestored { debt_id, timestamp: now }
            });
            Ok(debt)
        })
    }

    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn archived_debts(&self, caller: &Caller) -> Result<Vec<Debt>> {
        require_admin(caller)?;
        self.read(|repo| Ok(repo.debts().into_iter().filter(|d| d.archived).collect()))
    }

    /// Remove a debt that never received a payment.
    #[instrument(skip_all, fields(role = %caller.role, debt_id = %debt_id))]
    pub fn delete_debt(&self, caller: &Caller, debt_id: DebtId) -> Result<Debt> {
        require_admin(caller)?;
        let now = self.now();
        let debt = self.commit(|repo, effects| delete_debt_in(repo, effects, debt_id, now))?;
        info!(debt_id = %debt.id, "deleted debt");
        Ok(debt)
    }

    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn debts(&self, caller: &Caller) -> Result<Vec<Debt>> {
        self.read(|repo| {
            let debts = scoped_debts(repo, resolve_scope(repo, caller)?);
            debug!(count = debts.len(), "listed debts");
            Ok(debts)
        })
    }

    #[instrument(skip_all, fields(role = %caller.role, debt_id = %debt_id))]
    pub fn debt(&self, caller: &Caller, debt_id: DebtId) -> Result<Debt> {
        self.read(|repo| visible_debt(repo, caller, debt_id))
    }

    /// Case-insensitive match on the description.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn search_debts(&self, caller: &Caller, term: &str) -> Result<Vec<Debt>> {
        let needle = term.trim().to_lowercase();
        self.filter_debts(caller, |d| d.description.to_lowercase().contains(&needle))
    }

    #[instrument(skip_all, fields(role = %caller.role, status = %status))]
    pub fn debts_by_status(&self, caller: &Caller, status: DebtStatus) -> Result<Vec<Debt>> {
        self.filter_debts(caller, |d| d.status == status)
    }

    /// Debts whose total lies within `[min, max]`.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn debts_by_amount_range(&self, caller: &Caller, min: Money, max: Money) -> Result<Vec<Debt>> {
        if min > max {
            return Err(LedgerError::validation(format!(
                "minimum {} is greater than maximum {}",
                min, max
            )));
        }
        self.filter_debts(caller, |d| d.total_amount >= min && d.total_amount <= max)
    }

    /// Large active debts, biggest first.
    ///
    /// Admins get debts with a large remaining amount; a client gets its own
    /// debts with a large total.
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn high_priority_debts(&self, caller: &Caller) -> Result<Vec<Debt>> {
        let thresholds = &self.config.priority;
        self.read(|repo| {
            let scope = resolve_scope(repo, caller)?;
            let active = scoped_debts(repo, scope).into_iter().filter(Debt::is_active);
            let mut debts: Vec<Debt> = match scope {
                Scope::All => active
                    .filter(|d| d.remaining_amount >= thresholds.admin_min_remaining)
                    .collect(),
                Scope::Client(_) => active
                    .filter(|d| d.total_amount >= thresholds.client_min_total)
                    .collect(),
            };
            match scope {
                Scope::All => debts.sort_by_key(|d| Reverse(d.remaining_amount)),
                Scope::Client(_) => debts.sort_by_key(|d| Reverse(d.total_amount)),
            }
            Ok(debts)
        })
    }

    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn debt_statistics(&self, caller: &Caller) -> Result<DebtStatistics> {
        self.read(|repo| Ok(debt_statistics(&scoped_debts(repo, resolve_scope(repo, caller)?))))
    }

    fn filter_debts<P>(&self, caller: &Caller, predicate: P) -> Result<Vec<Debt>>
    where
        P: Fn(&Debt) -> bool,
    {
        self.read(|repo| {
            let debts: Vec<Debt> = scoped_debts(repo, resolve_scope(repo, caller)?)
                .into_iter()
                .filter(|d| predicate(d))
                .collect();
            debug!(count = debts.len(), "filtered debts");
            Ok(debts)
        })
    }
}

pub(crate) fn delete_debt_in(
    repo: &mut dyn LedgerRepository,
    effects: &mut Effects,
    debt_id: DebtId,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Debt> {
    let debt = repo
        .debt(debt_id)
        .ok_or_else(|| LedgerError::not_found("debt", debt_id))?;
    let payments = repo.payments_for_debt(debt_id).len();
    if payments > 0 {
        return Err(LedgerError::conflict(format!(
            "debt {} has {} payment(s) and cannot be deleted",
            debt_id, payments
        )));
    }
    let removed = repo.delete_debt(debt_id)?;
    effects.emit(LedgerEvent::DebtDeleted {
        debt_id,
        client_id: debt.client_id,
        timestamp: now,
    });
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use crate::balance::DiscrepancyKind;
    use crate::decimal::Money;
    use crate::entities::{DebtUpdate, NewDebt};
    use crate::errors::LedgerError;
    use crate::testing::Fixture;
    use crate::types::DebtStatus;

    #[test]
    fn test_create_debt() {
        let fx = Fixture::new();
        let client = fx.client("Tina", "+15554000");
        let due = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let debt = fx
            .ledger
            .create_debt(
                &fx.admin,
                NewDebt::new(client.id, Money::from_major(250), " gold ring ").due(due),
            )
            .unwrap();
        assert_eq!(debt.remaining_amount, Money::from_major(250));
        assert_eq!(debt.status, DebtStatus::Active);
        assert_eq!(debt.description, "gold ring");
        assert_eq!(debt.due_date, Some(due));
    }

    #[test]
    fn test_create_debt_rejections() {
        let fx = Fixture::new();
        let client = fx.client("Tina", "+15554000");

        let cases = [
            NewDebt::new(Uuid::new_v4(), Money::from_major(10), "ring"),
            NewDebt::new(client.id, Money::ZERO, "ring"),
            NewDebt::new(client.id, Money::ZERO - Money::from_major(5), "ring"),
            NewDebt::new(client.id, Money::from_major(10), "   "),
        ];
        for input in cases {
            let err = fx.ledger.create_debt(&fx.admin, input).unwrap_err();
            assert!(matches!(err, LedgerError::Validation { .. }), "{:?}", err);
        }

        let err = fx
            .ledger
            .create_debt(&fx.caller_for(&client), NewDebt::new(client.id, Money::from_major(10), "ring"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden { .. }));
    }

    #[test]
    fn test_amounts_beyond_column_range_rejected() {
        let fx = Fixture::new();
        let client = fx.client("Tina", "+15554000");
        let enormous = Money::from_str_exact("50000000000000000000000000000").unwrap();

        for _ in 0..2 {
            let err = fx
                .ledger
                .create_debt(&fx.admin, NewDebt::new(client.id, enormous, "vault"))
                .unwrap_err();
            assert!(matches!(err, LedgerError::Validation { .. }));
        }
        let err = fx
            .ledger
            .create_debt(&fx.admin, NewDebt::new(client.id, Money::from_major(100_000_000), "vault"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));

        let largest = Money::from_str_exact("99999999.99").unwrap();
        let a = fx
            .ledger
            .create_debt(&fx.admin, NewDebt::new(client.id, largest, "vault"))
            .unwrap();
        fx.ledger
            .create_debt(&fx.admin, NewDebt::new(client.id, largest, "safe"))
            .unwrap();

        let err = fx
            .ledger
            .update_debt(
                &fx.admin,
                a.id,
                DebtUpdate {
                    total_amount: Some(enormous),
                    ..DebtUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));

        let stats = fx.ledger.debt_statistics(&fx.admin).unwrap();
        assert_eq!(stats.total_remaining, largest + largest);
    }

    #[test]
    fn test_raising_total_after_override_keeps_audit_trail() {
        let fx = Fixture::new();
        let client = fx.client("Tina", "+15554000");
        let debt = fx.debt(&client, 100);
        fx.pay(&debt, 30);
        fx.ledger.settle_debts(&fx.admin, &[debt.id]).unwrap();

        let raised = fx
            .ledger
            .update_debt(
                &fx.admin,
                debt.id,
                DebtUpdate {
                    total_amount: Some(Money::from_major(120)),
                    ..DebtUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(raised.remaining_amount, Money::from_major(20));
        assert_eq!(raised.status, DebtStatus::Active);
        assert!(raised.settled_by_override);

        let findings = fx.ledger.verify_balances(&fx.admin).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, DiscrepancyKind::SettlementOverride);
        assert_eq!(findings[0].expected_remaining, Money::from_major(90));
    }

    #[test]
    fn test_update_total_shifts_remaining() {
        let fx = Fixture::new();
        let client = fx.client("Tina", "+15554000");
        let debt = fx.debt(&client, 100);
        fx.pay(&debt, 40);

        let raised = fx
            .ledger
            .update_debt(
                &fx.admin,
                debt.id,
                DebtUpdate {
                    total_amount: Some(Money::from_major(150)),
                    ..DebtUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(raised.remaining_amount, Money::from_major(110));

        let lowered = fx
            .ledger
            .update_debt(
                &fx.admin,
                debt.id,
                DebtUpdate {
                    total_amount: Some(Money::from_major(40)),
                    ..DebtUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(lowered.remaining_amount, Money::ZERO);
        assert_eq!(lowered.status, DebtStatus::Settled);

        let err = fx
            .ledger
            .update_debt(
                &fx.admin,
                debt.id,
                DebtUpdate {
                    total_amount: Some(Money::from_major(30)),
                    ..DebtUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        assert!(fx.ledger.verify_balances(&fx.admin).unwrap().is_empty());
    }

    #[test]
    fn test_delete_debt_requires_no_payments() {
        let fx = Fixture::new();
        let client = fx.client("Tina", "+15554000");
        let paid = fx.debt(&client, 100);
        let unpaid = fx.debt(&client, 80);
        fx.pay(&paid, 10);

        let err = fx.ledger.delete_debt(&fx.admin, paid.id).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));

        fx.ledger.delete_debt(&fx.admin, unpaid.id).unwrap();
        assert!(matches!(
            fx.ledger.debt(&fx.admin, unpaid.id),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_client_sees_only_own_debts() {
        let fx = Fixture::new();
        let uma = fx.client("Uma", "+15554001");
        let vic = fx.client("Vic", "+15554002");
        let own = fx.debt(&uma, 100);
        let other = fx.debt(&vic, 200);

        let as_uma = fx.caller_for(&uma);
        let visible: Vec<_> = fx.ledger.debts(&as_uma).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(visible, vec![own.id]);
        assert_eq!(fx.ledger.debts(&fx.admin).unwrap().len(), 2);

        assert!(matches!(
            fx.ledger.debt(&as_uma, other.id),
            Err(LedgerError::NotFound { .. })
        ));

        let stranger = crate::access::Caller::client("+15554999");
        assert!(matches!(
            fx.ledger.debts(&stranger),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_archived_debts_leave_listings() {
        let fx = Fixture::new();
        let client = fx.client("Uma", "+15554001");
        let debt = fx.debt(&client, 100);

        fx.ledger.archive_debt(&fx.admin, debt.id).unwrap();
        assert!(fx.ledger.debts(&fx.admin).unwrap().is_empty());
        assert_eq!(fx.ledger.archived_debts(&fx.admin).unwrap().len(), 1);

        fx.ledger.unarchive_debt(&fx.admin, debt.id).unwrap();
        assert_eq!(fx.ledger.debts(&fx.admin).unwrap().len(), 1);
    }

    #[test]
    fn test_filters_and_priority() {
        let fx = Fixture::new();
        let uma = fx.client("Uma", "+15554001");
        let vic = fx.client("Vic", "+15554002");
        let bracelet = fx.debt_with(&uma, 1200, "Silver bracelet");
        let necklace = fx.debt_with(&uma, 600, "Pearl necklace");
        let ring = fx.debt_with(&vic, 3000, "Diamond ring");
        fx.debt_with(&vic, 90, "Repair");
        fx.pay(&ring, 1000);

        let found = fx.ledger.search_debts(&fx.admin, "NECKLACE").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, necklace.id);

        let ranged = fx
            .ledger
            .debts_by_amount_range(&fx.admin, Money::from_major(600), Money::from_major(1200))
            .unwrap();
        assert_eq!(ranged.len(), 2);
        assert!(matches!(
            fx.ledger.debts_by_amount_range(&fx.admin, Money::from_major(10), Money::from_major(1)),
            Err(LedgerError::Validation { .. })
        ));

        let admin_priority: Vec<_> = fx
            .ledger
            .high_priority_debts(&fx.admin)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(admin_priority, vec![ring.id, bracelet.id]);

        let client_priority: Vec<_> = fx
            .ledger
            .high_priority_debts(&fx.caller_for(&uma))
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(client_priority, vec![bracelet.id, necklace.id]);

        let settled = fx.ledger.debts_by_status(&fx.admin, DebtStatus::Settled).unwrap();
        assert!(settled.is_empty());
    }

    #[test]
    fn test_debt_statistics_scoped() {
        let fx = Fixture::new();
        let uma = fx.client("Uma", "+15554001");
        let vic = fx.client("Vic", "+15554002");
        let a = fx.debt(&uma, 100);
        fx.debt(&uma, 300);
        fx.debt(&vic, 500);
        fx.pay(&a, 100);

        let mine = fx.ledger.debt_statistics(&fx.caller_for(&uma)).unwrap();
        assert_eq!(mine.active_count, 1);
        assert_eq!(mine.settled_count, 1);
        assert_eq!(mine.total_active_amount, Money::from_major(300));

        let all = fx.ledger.debt_statistics(&fx.admin).unwrap();
        assert_eq!(all.active_count, 2);
        assert_eq!(all.total_remaining, Money::from_major(800));
        assert_eq!(all.average_active_amount, Money::from_major(400));
    }
}
