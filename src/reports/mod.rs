//! Read-only aggregations over the ledger.
//!
//! Each report is a pure function over a [`Snapshot`] of the tables, with a
//! thin admin-gated wrapper on [`Ledger`](crate::ledger::Ledger).

pub mod clients;
pub mod dashboard;
pub mod periodic;
pub mod statistics;

pub use clients::{ClientOverdue, ClientRanking, ClientReport, OverdueReport};
pub use dashboard::{ClientBalance, Dashboard, MethodCount, MonthlyRevenue};
pub use periodic::{
    BusinessProjection, CollectionPerformance, DateRangeReport, MonthlyCollection, MonthlyReport,
    PaymentMethodAnalysis,
};
pub use statistics::{DebtStatistics, PaymentStatistics};

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::entities::{Client, Debt, Payment};
use crate::errors::{LedgerError, Result};
use crate::scheduler::schedule::{next_month, previous_month};
use crate::store::LedgerRepository;
use crate::types::{ClientId, PaymentMethod};

/// count and amount for one payment method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub count: usize,
    pub amount: Money,
}

/// consistent copy of the tables a report reads
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub clients: Vec<Client>,
    pub debts: Vec<Debt>,
    pub payments: Vec<Payment>,
}

impl Snapshot {
    pub fn load(repo: &dyn LedgerRepository) -> Self {
        Self {
            clients: repo.clients(),
            debts: repo.debts(),
            payments: repo.payments(),
        }
    }

    pub fn active_clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.iter().filter(|c| !c.archived)
    }

    /// payments dated within `[start, end)`
    pub fn payments_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&Payment> {
        self.payments
            .iter()
            .filter(|p| p.payment_date >= start && p.payment_date < end)
            .collect()
    }

    /// debts created within `[start, end)`
    pub fn debts_created_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&Debt> {
        self.debts
            .iter()
            .filter(|d| d.created_at >= start && d.created_at < end)
            .collect()
    }

    /// remaining amount on active debts, per client
    pub fn outstanding_by_client(&self) -> BTreeMap<ClientId, Money> {
        let mut outstanding = BTreeMap::new();
        for debt in self.debts.iter().filter(|d| d.is_active()) {
            *outstanding.entry(debt.client_id).or_insert(Money::ZERO) += debt.remaining_amount;
        }
        outstanding
    }

    pub fn total_outstanding(&self) -> Money {
        self.outstanding_by_client().values().sum()
    }

    /// clients owing a positive amount
    pub fn clients_with_outstanding(&self) -> usize {
        self.outstanding_by_client()
            .values()
            .filter(|m| m.is_positive())
            .count()
    }

    pub fn client_of(&self, debt: &Debt) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == debt.client_id)
    }

    pub fn payments_for_client(&self, client_id: ClientId) -> Vec<&Payment> {
        self.payments
            .iter()
            .filter(|p| {
                self.debts
                    .iter()
                    .any(|d| d.id == p.debt_id && d.client_id == client_id)
            })
            .collect()
    }
}

pub fn sum_amounts<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Money {
    payments.into_iter().map(|p| p.amount).sum()
}

/// per-method totals in `PaymentMethod::ALL` order, zero rows included
pub fn method_breakdown<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Vec<MethodTotal> {
    let mut totals: Vec<MethodTotal> = PaymentMethod::ALL
        .iter()
        .map(|&method| MethodTotal {
            method,
            count: 0,
            amount: Money::ZERO,
        })
        .collect();
    for payment in payments {
        if let Some(row) = totals.iter_mut().find(|t| t.method == payment.payment_method) {
            row.count += 1;
            row.amount += payment.amount;
        }
    }
    totals
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// `[midnight, next midnight)` of `date`
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(date);
    (start, start + Duration::days(1))
}

/// `[first day, first day of next month)`; ValidationError for a bad month
pub fn month_bounds(year: i32, month: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let invalid = || LedgerError::validation(format!("invalid month {}-{}", year, month));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let (next_year, next) = next_month(year, month);
    let following = NaiveDate::from_ymd_opt(next_year, next, 1).ok_or_else(invalid)?;
    Ok((start_of_day(first), start_of_day(following)))
}

/// the `count` calendar months ending with the month of `now`, oldest first
pub fn trailing_months(now: DateTime<Utc>, count: u32) -> Vec<(i32, u32)> {
    let mut months = Vec::with_capacity(count as usize);
    let (mut year, mut month) = (now.year(), now.month());
    for _ in 0..count {
        months.push((year, month));
        (year, month) = previous_month(year, month);
    }
    months.reverse();
    months
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds() {
        let (start, end) = month_bounds(2024, 12).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(matches!(month_bounds(2024, 13), Err(LedgerError::Validation { .. })));
        assert!(matches!(month_bounds(2024, 0), Err(LedgerError::Validation { .. })));
    }

    #[test]
    fn test_trailing_months_cross_year() {
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        assert_eq!(
            trailing_months(now, 4),
            vec![(2023, 11), (2023, 12), (2024, 1), (2024, 2)]
        );
    }

    #[test]
    fn test_method_breakdown_keeps_zero_rows() {
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let debt = uuid::Uuid::new_v4();
        let payments = vec![
            Payment::new(debt, Money::from_major(10), PaymentMethod::Card, None, now),
            Payment::new(debt, Money::from_major(15), PaymentMethod::Card, None, now),
        ];
        let rows = method_breakdown(&payments);
        assert_eq!(rows[0].method, PaymentMethod::Cash);
        assert_eq!(rows[0].count, 0);
        assert_eq!(rows[1].count, 2);
        assert_eq!(rows[1].amount, Money::from_major(25));
    }
}
