use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::{info, instrument};

use super::{Job, JobReport};
use crate::decimal::Money;
use crate::entities::Debt;
use crate::errors::Result;
use crate::ledger::Ledger;
use crate::notifications::{Notification, Recipient};
use crate::reports::clients::overdue_debts;
use crate::reports::{day_bounds, method_breakdown, month_bounds, sum_amounts, Snapshot};
use crate::scheduler::schedule::previous_month;
use crate::store::LedgerStore;

/// reminders for clients with open debts and no payment in the reminder window
pub fn payment_reminders(snapshot: &Snapshot, now: DateTime<Utc>, window_days: i64) -> Vec<Notification> {
    let since = now - Duration::days(window_days);
    snapshot
        .active_clients()
        .filter_map(|client| {
            let open: Vec<&Debt> = snapshot
                .debts
                .iter()
                .filter(|d| d.client_id == client.id && d.is_outstanding())
                .collect();
            if open.is_empty() {
                return None;
            }
            let paid_recently = snapshot
                .payments_for_client(client.id)
                .iter()
                .any(|p| p.payment_date > since);
            if paid_recently {
                return None;
            }
            Some(Notification::PaymentReminder {
                recipient: Recipient::client(client),
                active_debts: open.len(),
                outstanding: open.iter().map(|d| d.remaining_amount).sum(),
            })
        })
        .collect()
}

/// revenue of the day before `now`
pub fn daily_revenue(snapshot: &Snapshot, now: DateTime<Utc>) -> Notification {
    let date = now.date_naive() - Duration::days(1);
    let (start, end) = day_bounds(date);
    let payments = snapshot.payments_between(start, end);
    let total_revenue = sum_amounts(payments.iter().copied());
    Notification::DailyRevenue {
        date,
        payment_count: payments.len(),
        total_revenue,
        average_payment: Money::average(total_revenue, payments.len()),
    }
}

pub fn overdue_alerts(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<Notification> {
    overdue_debts(snapshot, now.date_naive())
        .into_iter()
        .filter_map(|debt| {
            let client = snapshot.client_of(debt)?;
            Some(Notification::DebtOverdue {
                recipient: Recipient::client(client),
                debt_id: debt.id,
                description: debt.description.clone(),
                remaining_amount: debt.remaining_amount,
                due_date: debt.due_date?,
            })
        })
        .collect()
}

/// summary of the calendar month before `now`
pub fn monthly_summary(snapshot: &Snapshot, now: DateTime<Utc>) -> Result<Notification> {
    let (year, month) = previous_month(now.year(), now.month());
    let (start, end) = month_bounds(year, month)?;
    let payments = snapshot.payments_between(start, end);
    let total_revenue = sum_amounts(payments.iter().copied());
    Ok(Notification::MonthlySummary {
        period_start: start.date_naive(),
        period_end: (end - Duration::days(1)).date_naive(),
        payment_count: payments.len(),
        total_revenue,
        average_payment: Money::average(total_revenue, payments.len()),
        by_method: method_breakdown(payments.iter().copied()),
    })
}

impl<S: LedgerStore> Ledger<S> {
    pub fn send_weekly_payment_reminders(&self) -> Result<JobReport> {
        self.run_job(Job::WeeklyPaymentReminders)
    }

    pub fn send_daily_revenue_summary(&self) -> Result<JobReport> {
        self.run_job(Job::DailyRevenueSummary)
    }

    pub fn send_overdue_alerts(&self) -> Result<JobReport> {
        self.run_job(Job::OverdueDebtAlerts)
    }

    pub fn send_monthly_summary(&self) -> Result<JobReport> {
        self.run_job(Job::MonthlySummary)
    }

    /// Run one periodic job in the system context. Jobs only read the ledger.
    #[instrument(skip_all, fields(job = %job))]
    pub fn run_job(&self, job: Job) -> Result<JobReport> {
        let now = self.now();
        let snapshot = self.read(|repo| Ok(Snapshot::load(repo)))?;

        let notifications = match job {
            Job::WeeklyPaymentReminders => {
                payment_reminders(&snapshot, now, self.config().reminder_window_days)
            }
            Job::DailyRevenueSummary => vec![daily_revenue(&snapshot, now)],
            Job::OverdueDebtAlerts => overdue_alerts(&snapshot, now),
            Job::MonthlySummary => vec![monthly_summary(&snapshot, now)?],
        };

        let delivered = self.notify(&notifications);
        info!(prepared = notifications.len(), delivered, "job finished");
        Ok(JobReport {
            job,
            ran_at: now,
            prepared: notifications.len(),
            delivered,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::decimal::Money;
    use crate::entities::NewDebt;
    use crate::notifications::Notification;
    use crate::testing::Fixture;
    use crate::types::PaymentMethod;

    #[test]
    fn test_reminders_skip_recent_payers() {
        let fx = Fixture::new();
        let quiet = fx.client("Quiet", "+15558000");
        let payer = fx.client("Payer", "+15558001");
        let done = fx.client("Done", "+15558002");
        fx.debt(&quiet, 100);
        fx.debt(&quiet, 50);
        let p = fx.debt(&payer, 100);
        let d = fx.debt(&done, 40);
        fx.pay(&d, 40);

        fx.advance(Duration::days(8));
        fx.pay(&p, 10);
        fx.notifier.take();

        let report = fx.ledger.send_weekly_payment_reminders().unwrap();
        assert_eq!(report.prepared, 1);
        assert_eq!(report.delivered, 1);

        match &fx.notifier.sent()[0] {
            Notification::PaymentReminder {
                active_debts,
                outstanding,
                ..
            } => {
                assert_eq!(*active_debts, 2);
                assert_eq!(*outstanding, Money::from_major(150));
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[test]
    fn test_daily_revenue_covers_yesterday() {
        let fx = Fixture::new();
        let client = fx.client("Rosa", "+15558000");
        let debt = fx.debt(&client, 500);
        fx.pay(&debt, 100);
        fx.pay(&debt, 50);
        fx.advance(Duration::days(1));
        fx.pay(&debt, 5);
        fx.notifier.take();

        fx.ledger.send_daily_revenue_summary().unwrap();
        match &fx.notifier.sent()[0] {
            Notification::DailyRevenue {
                payment_count,
                total_revenue,
                average_payment,
                ..
            } => {
                assert_eq!(*payment_count, 2);
                assert_eq!(*total_revenue, Money::from_major(150));
                assert_eq!(*average_payment, Money::from_major(75));
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[test]
    fn test_overdue_alerts_only_for_open_debts() {
        let fx = Fixture::new();
        let client = fx.client("Rosa", "+15558000");
        let due = fx.ledger.today() + Duration::days(2);
        let open = fx
            .ledger
            .create_debt(&fx.admin, NewDebt::new(client.id, Money::from_major(90), "bracelet").due(due))
            .unwrap();
        let closed = fx
            .ledger
            .create_debt(&fx.admin, NewDebt::new(client.id, Money::from_major(30), "pendant").due(due))
            .unwrap();
        fx.pay(&closed, 30);

        assert_eq!(fx.ledger.send_overdue_alerts().unwrap().prepared, 0);

        fx.advance(Duration::days(3));
        fx.notifier.take();
        let report = fx.ledger.send_overdue_alerts().unwrap();
        assert_eq!(report.prepared, 1);
        assert!(matches!(
            &fx.notifier.sent()[0],
            Notification::DebtOverdue { debt_id, .. } if *debt_id == open.id
        ));
    }

    #[test]
    fn test_monthly_summary_previous_month() {
        let fx = Fixture::new();
        let client = fx.client("Rosa", "+15558000");
        let debt = fx.debt(&client, 500);
        fx.pay(&debt, 100);
        fx.ledger
            .add_payment(
                &fx.admin,
                crate::entities::NewPayment::new(debt.id, Money::from_major(60), PaymentMethod::Card),
            )
            .unwrap();
        fx.advance(Duration::days(31));
        fx.notifier.take();

        fx.ledger.send_monthly_summary().unwrap();
        match &fx.notifier.sent()[0] {
            Notification::MonthlySummary {
                payment_count,
                total_revenue,
                by_method,
                period_start,
                ..
            } => {
                assert_eq!(*payment_count, 2);
                assert_eq!(*total_revenue, Money::from_major(160));
                assert_eq!(by_method.len(), 2);
                assert_eq!(period_start.to_string(), "2024-06-01");
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[test]
    fn test_jobs_survive_notifier_outage() {
        let fx = Fixture::new();
        fx.notifier.fail_with("smtp down");
        let report = fx.ledger.send_daily_revenue_summary().unwrap();
        assert_eq!(report.prepared, 1);
        assert_eq!(report.delivered, 0);
    }
}
