use std::cmp::Reverse;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{day_bounds, method_breakdown, month_bounds, sum_amounts, trailing_months, Snapshot};
use crate::access::{require_admin, Caller};
use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::entities::{Client, Payment};
use crate::errors::Result;
use crate::ledger::Ledger;
use crate::store::LedgerStore;
use crate::types::PaymentMethod;

/// a client with what it still owes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientBalance {
    pub client: Client,
    pub outstanding: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub revenue: Money,
    pub payment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCount {
    pub method: PaymentMethod,
    pub count: usize,
}

/// admin landing page figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub today_revenue: Money,
    pub month_revenue: Money,
    pub total_outstanding: Money,
    pub clients_with_outstanding: usize,
    pub total_clients: usize,
    pub recent_payments: Vec<Payment>,
    pub top_debtors: Vec<ClientBalance>,
    pub payment_methods_this_month: Vec<MethodCount>,
    /// oldest month first, current month last
    pub revenue_trend: Vec<MonthlyRevenue>,
}

/// clients with a positive balance, largest first
pub fn top_debtors(snapshot: &Snapshot, limit: usize) -> Vec<ClientBalance> {
    let outstanding = snapshot.outstanding_by_client();
    let mut balances: Vec<ClientBalance> = snapshot
        .clients
        .iter()
        .filter_map(|client| {
            outstanding
                .get(&client.id)
                .filter(|m| m.is_positive())
                .map(|&m| ClientBalance {
                    client: client.clone(),
                    outstanding: m,
                })
        })
        .collect();
    balances.sort_by_key(|b| Reverse(b.outstanding));
    balances.truncate(limit);
    balances
}

pub fn build_dashboard(snapshot: &Snapshot, now: DateTime<Utc>, config: &LedgerConfig) -> Result<Dashboard> {
    let (day_start, day_end) = day_bounds(now.date_naive());
    let (month_start, month_end) = month_bounds(now.year(), now.month())?;
    let month_payments = snapshot.payments_between(month_start, month_end);

    let mut recent: Vec<Payment> = snapshot.payments.clone();
    recent.sort_by_key(|p| Reverse(p.payment_date));
    recent.truncate(config.recent_payments_limit);

    let mut revenue_trend = Vec::new();
    for (year, month) in trailing_months(now, config.dashboard_trend_months) {
        let (start, end) = month_bounds(year, month)?;
        let payments = snapshot.payments_between(start, end);
        revenue_trend.push(MonthlyRevenue {
            year,
            month,
            revenue: sum_amounts(payments.iter().copied()),
            payment_count: payments.len(),
        });
    }

    Ok(Dashboard {
        today_revenue: sum_amounts(snapshot.payments_between(day_start, day_end)),
        month_revenue: sum_amounts(month_payments.iter().copied()),
        total_outstanding: snapshot.total_outstanding(),
        clients_with_outstanding: snapshot.clients_with_outstanding(),
        total_clients: snapshot.active_clients().count(),
        recent_payments: recent,
        top_debtors: top_debtors(snapshot, config.top_debtors_limit),
        payment_methods_this_month: method_breakdown(month_payments.iter().copied())
            .into_iter()
            .map(|t| MethodCount {
                method: t.method,
                count: t.count,
            })
            .collect(),
        revenue_trend,
    })
}

impl<S: LedgerStore> Ledger<S> {
    #[instrument(skip_all, fields(role = %caller.role))]
    pub fn dashboard(&self, caller: &Caller) -> Result<Dashboard> {
        require_admin(caller)?;
        let now = self.now();
        let snapshot = self.read(|repo| Ok(Snapshot::load(repo)))?;
        build_dashboard(&snapshot, now, self.config())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::decimal::Money;
    use crate::errors::LedgerError;
    use crate::testing::Fixture;
    use crate::types::PaymentMethod;

    #[test]
    fn test_dashboard_figures() {
        let fx = Fixture::new();
        let ana = fx.client("Ana", "+15557000");
        let ben = fx.client("Ben", "+15557001");
        let carl = fx.client("Carl", "+15557002");
        let a = fx.debt(&ana, 500);
        let b = fx.debt(&ben, 300);
        let c = fx.debt(&carl, 80);

        fx.pay(&a, 100);
        fx.advance(Duration::days(1));
        fx.pay(&b, 50);
        fx.pay(&c, 80);

        let dashboard = fx.ledger.dashboard(&fx.admin).unwrap();
        assert_eq!(dashboard.today_revenue, Money::from_major(130));
        assert_eq!(dashboard.total_outstanding, Money::from_major(650));
        assert_eq!(dashboard.clients_with_outstanding, 2);
        assert_eq!(dashboard.total_clients, 3);
        assert_eq!(dashboard.recent_payments.len(), 3);
        assert_eq!(dashboard.top_debtors[0].client.id, ana.id);
        assert_eq!(dashboard.top_debtors[0].outstanding, Money::from_major(400));
        assert_eq!(dashboard.top_debtors.len(), 2);
        assert_eq!(dashboard.revenue_trend.len(), 6);
        assert_eq!(dashboard.revenue_trend.last().map(|m| m.payment_count), Some(3));

        let card = dashboard
            .payment_methods_this_month
            .iter()
            .find(|m| m.method == PaymentMethod::Card)
            .map(|m| m.count);
        assert_eq!(card, Some(0));

        assert!(matches!(
            fx.ledger.dashboard(&fx.caller_for(&ana)),
            Err(LedgerError::Forbidden { .. })
        ));
    }
}
