use chrono::{DateTime, Datelike, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{method_breakdown, month_bounds, sum_amounts, MethodTotal, Snapshot};
use crate::access::{require_admin, Caller};
use crate::decimal::{Money, Rate};
use crate::entities::Payment;
use crate::errors::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::store::LedgerStore;
use crate::types::PaymentMethod;

/// activity of one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub total_payments: Money,
    pub payment_count: usize,
    pub payments_by_method: Vec<MethodTotal>,
    /// current outstanding balance across all clients
    pub total_outstanding: Money,
    pub clients_with_outstanding: usize,
    pub new_debt_total: Money,
    pub new_debt_count: usize,
    /// settled debts that received a payment during the month
    pub settled_debt_count: usize,
}

pub fn monthly_report(snapshot: &Snapshot, year: i32, month: u32) -> Result<MonthlyReport> {
    let (start, end) = month_bounds(year, month)?;
    let payments = snapshot.payments_between(start, end);
    let new_debts = snapshot.debts_created_between(start, end);

    let settled_debt_count = snapshot
        .debts
        .iter()
        .filter(|d| !d.is_active())
        .filter(|d| payments.iter().any(|p| p.debt_id == d.id))
        .count();

    Ok(MonthlyReport {
        year,
        month,
        total_payments: sum_amounts(payments.iter().copied()),
        payment_count: payments.len(),
        payments_by_method: method_breakdown(payments.iter().copied()),
        total_outstanding: snapshot.total_outstanding(),
        clients_with_outstanding: snapshot.clients_with_outstanding(),
        new_debt_total: new_debts.iter().map(|d| d.total_amount).sum(),
        new_debt_count: new_debts.len(),
        settled_debt_count,
    })
}

/// activity within an arbitrary `[start, end)` range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_payments: Money,
    pub total_new_debt: Money,
    pub payments_by_method: Vec<MethodTotal>,
    pub payment_count: usize,
    pub new_debt_count: usize,
    /// collected over newly issued debt; `None` when no debt was issued
    pub collection_rate: Option<Rate>,
}

fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(LedgerError::validation(format!(
            "range start {} must be before end {}",
            start, end
        )));
    }
    Ok(())
}

pub fn date_range_report(snapshot: &Snapshot, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<DateRangeReport> {
    check_range(start, end)?;
    let payments = snapshot.payments_between(start, end);
    let new_debts = snapshot.debts_created_between(start, end);
    let total_payments = sum_amounts(payments.iter().copied());
    let total_new_debt: Money = new_debts.iter().map(|d| d.total_amount).sum();

    Ok(DateRangeReport {
        start,
        end,
        total_payments,
        total_new_debt,
        payments_by_method: method_breakdown(payments.iter().copied()),
        payment_count: payments.len(),
        new_debt_count: new_debts.len(),
        collection_rate: Rate::ratio(total_payments, total_new_debt),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCollection {
    pub year: i32,
    pub month: u32,
    pub amount: Money,
}

/// collections over a trailing window, bucketed by month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionPerformance {
    pub total_collections: Money,
    /// months that saw at least one payment, oldest first
    pub monthly: Vec<MonthlyCollection>,
    /// mean month-over-month growth; `None` with fewer than two comparable months
    pub average_growth: Option<Rate>,
    pub payment_count: usize,
}

fn window_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn collection_performance(snapshot: &Snapshot, now: DateTime<Utc>, months: u32) -> Result<CollectionPerformance> {
    if months == 0 {
        return Err(LedgerError::validation("months must be at least 1"));
    }
    let payments: Vec<&Payment> = snapshot
        .payments
        .iter()
        .filter(|p| p.payment_date >= window_start(now, months) && p.payment_date <= now)
        .collect();

    let mut monthly: Vec<MonthlyCollection> = Vec::new();
    let mut ordered = payments.clone();
    ordered.sort_by_key(|p| p.payment_date);
    for payment in ordered {
        let (year, month) = (payment.payment_date.year(), payment.payment_date.month());
        match monthly.last_mut() {
            Some(bucket) if bucket.year == year && bucket.month == month => bucket.amount += payment.amount,
            _ => monthly.push(MonthlyCollection {
                year,
                month,
                amount: payment.amount,
            }),
        }
    }

    let growths: Vec<Decimal> = monthly
        .windows(2)
        .filter_map(|pair| Rate::growth(pair[0].amount, pair[1].amount))
        .map(|r| r.as_decimal())
        .collect();
    let average_growth = if growths.is_empty() {
        None
    } else {
        let sum: Decimal = growths.iter().sum();
        Some(Rate::from_decimal(
            (sum / Decimal::from(growths.len() as u64)).round_dp(6),
        ))
    };

    Ok(CollectionPerformance {
        total_collections: sum_amounts(payments.iter().copied()),
        monthly,
        average_growth,
        payment_count: payments.len(),
    })
}

/// how customers pay within a range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodAnalysis {
    pub methods: Vec<MethodTotal>,
    /// most payments; ties go to the method listed first
    pub most_popular: Option<PaymentMethod>,
    /// largest amount; ties go to the method listed first
    pub highest_volume: Option<PaymentMethod>,
    pub total_amount: Money,
    pub payment_count: usize,
}

pub fn payment_method_analysis(
    snapshot: &Snapshot,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<PaymentMethodAnalysis> {
    check_range(start, end)?;
    let payments = snapshot.payments_between(start, end);
    let methods = method_breakdown(payments.iter().copied());

    let mut most_popular: Option<&MethodTotal> = None;
    let mut highest_volume: Option<&MethodTotal> = None;
    for row in methods.iter().filter(|r| r.count > 0) {
        if most_popular.map_or(true, |best| row.count > best.count) {
            most_popular = Some(row);
        }
        if highest_volume.map_or(true, |best| row.amount > best.amount) {
            highest_volume = Some(row);
        }
    }

    Ok(PaymentMethodAnalysis {
        most_popular: most_popular.map(|r| r.method),
        highest_volume: highest_volume.map(|r| r.method),
        total_amount: sum_amounts(payments.iter().copied()),
        payment_count: payments.len(),
        methods,
    })
}

/// naive forward projection of collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProjection {
    pub months: u32,
    pub projected_monthly_collection: Money,
    pub projected_collections: Money,
    /// current outstanding minus projected collections, floored at zero
    pub projected_outstanding: Money,
    pub average_growth: Option<Rate>,
}

pub fn business_projection(
    snapshot: &Snapshot,
    now: DateTime<Utc>,
    months: u32,
    history_months: u32,
) -> Result<BusinessProjection> {
    if months == 0 {
        return Err(LedgerError::validation("projection months must be at least 1"));
    }
    let history = collection_performance(snapshot, now, history_months)?;

    let historical: Money = history.monthly.iter().map(|m| m.amount).sum();
    let average_monthly = Money::average(historical, history.monthly.len());
    let growth = history.average_growth.map(|r| r.as_decimal()).unwrap_or(Decimal::ZERO);
    let projected_monthly_collection = average_monthly * (Decimal::ONE + growth);
    let projected_collections = projected_monthly_collection * Decimal::from(months);
    let projected_outstanding = (snapshot.total_outstanding() - projected_collections).max(Money::ZERO);

    Ok(BusinessProjection {
        months,
        projected_monthly_collection,
        projected_collections,
        projected_outstanding,
        average_growth: history.average_growth,
    })
}

impl<S: LedgerStore> Ledger<S> {
    fn admin_snapshot(&self, caller: &Caller) -> Result<Snapshot> {
        require_admin(caller)?;
        self.read(|repo| Ok(Snapshot::load(repo)))
    }

    /// ValidationError for a month outside 1..=12.
    #[instrument(skip_all, fields(role = %caller.role, year = year, month = month))]
    pub fn monthly_report(&self, caller: &Caller, year: i32, month: u32) -> Result<MonthlyReport> {
        monthly_report(&self.admin_snapshot(caller)?, year, month)
    }

    #[instrument(skip_all, fields(role = %caller.role, start = %start, end = %end))]
    pub fn date_range_report(&self, caller: &Caller, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<DateRangeReport> {
        date_range_report(&self.admin_snapshot(caller)?, start, end)
    }

    #[instrument(skip_all, fields(role = %caller.role, months = months))]
    pub fn collection_performance(&self, caller: &Caller, months: u32) -> Result<CollectionPerformance> {
        let now = self.now();
        collection_performance(&self.admin_snapshot(caller)?, now, months)
    }

    #[instrument(skip_all, fields(role = %caller.role, start = %start, end = %end))]
    pub fn payment_method_analysis(
        &self,
        caller: &Caller,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PaymentMethodAnalysis> {
        payment_method_analysis(&self.admin_snapshot(caller)?, start, end)
    }

    #[instrument(skip_all, fields(role = %caller.role, months = months))]
    pub fn business_projection(&self, caller: &Caller, months: u32) -> Result<BusinessProjection> {
        let now = self.now();
        let history = self.config().projection_history_months;
        business_projection(&self.admin_snapshot(caller)?, now, months, history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Client, Debt};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    /// one client with a 1000 debt created in March and paid down over three months
    fn snapshot() -> Snapshot {
        let created = at(2024, 3, 5);
        let client = Client::new("Dora".to_string(), None, "+15558000".to_string(), None, Uuid::new_v4(), created);
        let mut debt = Debt::new(client.id, Money::from_major(1000), "set".to_string(), None, created);
        let mut payments = Vec::new();
        for (amount, method, date) in [
            (100, PaymentMethod::Cash, at(2024, 3, 10)),
            (200, PaymentMethod::Card, at(2024, 4, 10)),
            (100, PaymentMethod::Cash, at(2024, 5, 10)),
            (50, PaymentMethod::Cash, at(2024, 5, 11)),
        ] {
            let amount = Money::from_major(amount);
            debt.apply_payment(amount, date).unwrap();
            payments.push(Payment::new(debt.id, amount, method, None, date));
        }
        Snapshot {
            clients: vec![client],
            debts: vec![debt],
            payments,
        }
    }

    #[test]
    fn test_monthly_report() {
        let report = monthly_report(&snapshot(), 2024, 5).unwrap();
        assert_eq!(report.total_payments, Money::from_major(150));
        assert_eq!(report.payment_count, 2);
        assert_eq!(report.total_outstanding, Money::from_major(550));
        assert_eq!(report.clients_with_outstanding, 1);
        assert_eq!(report.new_debt_count, 0);
        assert_eq!(report.settled_debt_count, 0);

        let march = monthly_report(&snapshot(), 2024, 3).unwrap();
        assert_eq!(march.new_debt_total, Money::from_major(1000));

        assert!(matches!(
            monthly_report(&snapshot(), 2024, 13),
            Err(LedgerError::Validation { .. })
        ));
    }

    #[test]
    fn test_date_range_report_is_half_open() {
        let report = date_range_report(&snapshot(), at(2024, 3, 1), at(2024, 4, 10)).unwrap();
        assert_eq!(report.payment_count, 1);
        assert_eq!(report.collection_rate.map(|r| r.as_decimal()), Some(dec!(0.1)));

        let no_debt = date_range_report(&snapshot(), at(2024, 5, 1), at(2024, 6, 1)).unwrap();
        assert_eq!(no_debt.collection_rate, None);

        assert!(date_range_report(&snapshot(), at(2024, 6, 1), at(2024, 5, 1)).is_err());
    }

    #[test]
    fn test_collection_performance_growth() {
        let perf = collection_performance(&snapshot(), at(2024, 5, 31), 6).unwrap();
        assert_eq!(perf.monthly.len(), 3);
        assert_eq!(perf.total_collections, Money::from_major(450));
        // +100% then -25%
        assert_eq!(perf.average_growth.map(|r| r.as_decimal()), Some(dec!(0.375)));
    }

    #[test]
    fn test_payment_method_analysis() {
        let analysis = payment_method_analysis(&snapshot(), at(2024, 1, 1), at(2024, 12, 1)).unwrap();
        assert_eq!(analysis.most_popular, Some(PaymentMethod::Cash));
        assert_eq!(analysis.highest_volume, Some(PaymentMethod::Cash));
        assert_eq!(analysis.payment_count, 4);

        let april = payment_method_analysis(&snapshot(), at(2024, 4, 1), at(2024, 5, 1)).unwrap();
        assert_eq!(april.most_popular, Some(PaymentMethod::Card));

        let empty = payment_method_analysis(&snapshot(), at(2023, 1, 1), at(2023, 2, 1)).unwrap();
        assert_eq!(empty.most_popular, None);
    }

    #[test]
    fn test_business_projection() {
        let projection = business_projection(&snapshot(), at(2024, 5, 31), 2, 6).unwrap();
        // average 150 per month grown by 37.5%
        assert_eq!(projection.projected_monthly_collection, Money::from_str_exact("206.25").unwrap());
        assert_eq!(projection.projected_collections, Money::from_str_exact("412.50").unwrap());
        assert_eq!(projection.projected_outstanding, Money::from_str_exact("137.50").unwrap());

        let far = business_projection(&snapshot(), at(2024, 5, 31), 12, 6).unwrap();
        assert_eq!(far.projected_outstanding, Money::ZERO);
        assert!(business_projection(&snapshot(), at(2024, 5, 31), 0, 6).is_err());
    }
}
