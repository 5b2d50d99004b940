use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{sum_amounts, Snapshot};
use crate::access::{require_admin, Caller};
use crate::decimal::Money;
use crate::entities::{Client, Debt, Payment};
use crate::errors::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::store::LedgerStore;
use crate::types::ClientId;

/// full history of one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReport {
    pub client: Client,
    pub total_debt_ever: Money,
    pub total_paid: Money,
    pub current_outstanding: Money,
    pub active_debts: Vec<Debt>,
    pub settled_debts: Vec<Debt>,
    pub payments: Vec<Payment>,
}

pub fn client_report(snapshot: &Snapshot, client_id: ClientId) -> Result<ClientReport> {
    let client = snapshot
        .clients
        .iter()
        .find(|c| c.id == client_id)
        .cloned()
        .ok_or_else(|| LedgerError::not_found("client", client_id))?;

    let debts: Vec<&Debt> = snapshot.debts.iter().filter(|d| d.client_id == client_id).collect();
    let (active_debts, settled_debts): (Vec<Debt>, Vec<Debt>) =
        debts.iter().map(|&d| d.clone()).partition(|d| d.is_active());
    let mut payments: Vec<Payment> = snapshot
        .payments_for_client(client_id)
        .into_iter()
        .cloned()
        .collect();
    payments.sort_by_key(|p| Reverse(p.payment_date));

    Ok(ClientReport {
        client,
        total_debt_ever: debts.iter().map(|d| d.total_amount).sum(),
        total_paid: sum_amounts(&payments),
        current_outstanding: active_debts.iter().map(|d| d.remaining_amount).sum(),
        active_debts,
        settled_debts,
        payments,
    })
}

/// a client ranked by what it owes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRanking {
    pub client: Client,
    pub outstanding: Money,
    pub total_paid: Money,
    pub payment_count: usize,
}

pub fn top_clients_by_debt(snapshot: &Snapshot, limit: usize) -> Vec<ClientRanking> {
    let outstanding = snapshot.outstanding_by_client();
    let mut rankings: Vec<ClientRanking> = snapshot
        .clients
        .iter()
        .filter_map(|client| {
            let owed = outstanding.get(&client.id).copied().filter(Money::is_positive)?;
            let payments = snapshot.payments_for_client(client.id);
            Some(ClientRanking {
                client: client.clone(),
                outstanding: owed,
                total_paid: sum_amounts(payments.iter().copied()),
                payment_count: payments.len(),
            })
        })
        .collect();
    rankings.sort_by_key(|r| Reverse(r.outstanding));
    rankings.truncate(limit);
    rankings
}

/// overdue debts of one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOverdue {
    pub client: Client,
    pub total_overdue: Money,
    pub debts: Vec<Debt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueReport {
    pub as_of: NaiveDate,
    pub total_overdue: Money,
    pub overdue_debt_count: usize,
    /// clients by overdue amount, largest first
    pub clients: Vec<ClientOverdue>,
}

/// active debts whose due date is before `today`, with a positive remaining amount
pub fn overdue_debts(snapshot: &Snapshot, today: NaiveDate) -> Vec<&Debt> {
    snapshot
        .debts
        .iter()
        .filter(|d| d.is_overdue(today) && d.remaining_amount.is_positive())
        .collect()
}

pub fn overdue_report(snapshot: &Snapshot, today: NaiveDate) -> OverdueReport {
    let overdue = overdue_debts(snapshot, today);

    let mut by_client: BTreeMap<ClientId, Vec<Debt>> = BTreeMap::new();
    for debt in &overdue {
        by_client.entry(debt.client_id).or_default().push((*debt).clone());
    }
    let mut clients: Vec<ClientOverdue> = by_client
        .into_iter()
        .filter_map(|(client_id, debts)| {
            let client = snapshot.clients.iter().find(|c| c.id == client_id)?.clone();
            Some(ClientOverdue {
                client,
                total_overdue: debts.iter().map(|d| d.remaining_amount).sum(),
                debts,
            })
        })
        .collect();
    clients.sort_by_key(|c| Reverse(c.total_overdue));

    OverdueReport {
        as_of: today,
        total_overdue: overdue.iter().map(|d| d.remaining_amount).sum(),
        overdue_debt_count: overdue.len(),
        clients,
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Admins may report on any client; a client only on itself.
    #[instrument(skip_all, fields(role = %caller.role, client_id = %client_id))]
    pub fn client_report(&self, caller: &Caller, client_id: ClientId) -> Result<ClientReport> {
        let snapshot = self.read(|repo| {
            crate::ledger::visible_client(repo, caller, client_id)?;
            Ok(Snapshot::load(repo))
        })?;
        client_report(&snapshot, client_id)
    }

    #[instrument(skip_all, fields(role = %caller.role, limit = limit))]
    pub fn top_clients_by_debt(&self, caller: &Caller, limit: usize) -> Result<Vec<ClientRanking>> {
        require_admin(caller)?;
        let snapshot = self.read(|repo| Ok(Snapshot::load(repo)))?;
        Ok(top_clients_by_debt(&snapshot, limit))
    }

    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn overdue_debts_report(&self, caller: &Caller) -> Result<OverdueReport> {
        require_admin(caller)?;
        let today = self.today();
        let snapshot = self.read(|repo| Ok(Snapshot::load(repo)))?;
        Ok(overdue_report(&snapshot, today))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::decimal::Money;
    use crate::entities::NewDebt;
    use crate::errors::LedgerError;
    use crate::testing::Fixture;

    #[test]
    fn test_client_report() {
        let fx = Fixture::new();
        let eli = fx.client("Eli", "+15559000");
        let fay = fx.client("Fay", "+15559001");
        let a = fx.debt(&eli, 300);
        let b = fx.debt(&eli, 100);
        fx.pay(&a, 120);
        fx.pay(&b, 100);

        let report = fx.ledger.client_report(&fx.caller_for(&eli), eli.id).unwrap();
        assert_eq!(report.total_debt_ever, Money::from_major(400));
        assert_eq!(report.total_paid, Money::from_major(220));
        assert_eq!(report.current_outstanding, Money::from_major(180));
        assert_eq!(report.active_debts.len(), 1);
        assert_eq!(report.settled_debts.len(), 1);
        assert_eq!(report.payments.len(), 2);

        assert!(matches!(
            fx.ledger.client_report(&fx.caller_for(&eli), fay.id),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_top_clients() {
        let fx = Fixture::new();
        let eli = fx.client("Eli", "+15559000");
        let fay = fx.client("Fay", "+15559001");
        let gus = fx.client("Gus", "+15559002");
        fx.debt(&eli, 100);
        let f = fx.debt(&fay, 900);
        fx.debt(&gus, 10);
        fx.pay(&f, 100);

        let top = fx.ledger.top_clients_by_debt(&fx.admin, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].client.id, fay.id);
        assert_eq!(top[0].outstanding, Money::from_major(800));
        assert_eq!(top[0].payment_count, 1);
        assert_eq!(top[1].client.id, eli.id);
    }

    #[test]
    fn test_overdue_report() {
        let fx = Fixture::new();
        let eli = fx.client("Eli", "+15559000");
        let fay = fx.client("Fay", "+15559001");
        let today = fx.ledger.today();

        let due_soon = today + Duration::days(3);
        let past = today - Duration::days(1);
        let late = fx
            .ledger
            .create_debt(&fx.admin, NewDebt::new(eli.id, Money::from_major(200), "late").due(past))
            .unwrap();
        fx.ledger
            .create_debt(&fx.admin, NewDebt::new(eli.id, Money::from_major(50), "later").due(due_soon))
            .unwrap();
        fx.ledger
            .create_debt(&fx.admin, NewDebt::new(fay.id, Money::from_major(500), "late too").due(past))
            .unwrap();
        fx.pay(&late, 20);

        let report = fx.ledger.overdue_debts_report(&fx.admin).unwrap();
        assert_eq!(report.overdue_debt_count, 2);
        assert_eq!(report.total_overdue, Money::from_major(680));
        assert_eq!(report.clients[0].client.id, fay.id);
        assert_eq!(report.clients[1].total_overdue, Money::from_major(180));
    }
}
