use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};

use super::{month_bounds, sum_amounts};
use crate::decimal::{Money, Rate};
use crate::entities::{Debt, Payment};
use crate::scheduler::schedule::previous_month;

/// counts and totals over a set of debts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtStatistics {
    /// sum of totals of active debts
    pub total_active_amount: Money,
    pub total_remaining: Money,
    pub active_count: usize,
    pub settled_count: usize,
    pub average_active_amount: Money,
}

pub fn debt_statistics(debts: &[Debt]) -> DebtStatistics {
    let active: Vec<&Debt> = debts.iter().filter(|d| d.is_active()).collect();
    let total_active_amount: Money = active.iter().map(|d| d.total_amount).sum();

    DebtStatistics {
        total_active_amount,
        total_remaining: active.iter().map(|d| d.remaining_amount).sum(),
        active_count: active.len(),
        settled_count: debts.len() - active.len(),
        average_active_amount: Money::average(total_active_amount, active.len()),
    }
}

/// totals over a set of payments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatistics {
    pub total_amount: Money,
    pub payment_count: usize,
    /// mean payment inside the trailing statistics window
    pub average_amount: Money,
    pub this_month_total: Money,
    pub previous_month_total: Money,
    /// month-over-month change; `None` when last month had no revenue
    pub growth_rate: Option<Rate>,
}

pub fn payment_statistics(payments: &[Payment], now: DateTime<Utc>, window_months: u32) -> PaymentStatistics {
    let window_start = now
        .checked_sub_months(Months::new(window_months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let windowed: Vec<&Payment> = payments
        .iter()
        .filter(|p| p.payment_date >= window_start && p.payment_date <= now)
        .collect();

    let month_total = |year: i32, month: u32| -> Money {
        month_bounds(year, month)
            .map(|(start, end)| {
                sum_amounts(
                    payments
                        .iter()
                        .filter(|p| p.payment_date >= start && p.payment_date < end),
                )
            })
            .unwrap_or(Money::ZERO)
    };
    let this_month_total = month_total(now.year(), now.month());
    let (prev_year, prev_month) = previous_month(now.year(), now.month());
    let previous_month_total = month_total(prev_year, prev_month);

    PaymentStatistics {
        total_amount: sum_amounts(payments),
        payment_count: payments.len(),
        average_amount: Money::average(sum_amounts(windowed.iter().copied()), windowed.len()),
        this_month_total,
        previous_month_total,
        growth_rate: Rate::growth(previous_month_total, this_month_total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn paid(amount: i64, at: DateTime<Utc>) -> Payment {
        Payment::new(Uuid::new_v4(), Money::from_major(amount), PaymentMethod::Cash, None, at)
    }

    #[test]
    fn test_debt_statistics_empty() {
        assert_eq!(debt_statistics(&[]), DebtStatistics::default());
    }

    #[test]
    fn test_payment_statistics_window_and_growth() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let payments = vec![
            paid(100, Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()),
            paid(200, Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap()),
            paid(200, Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap()),
            paid(900, Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()),
        ];

        let stats = payment_statistics(&payments, now, 12);
        assert_eq!(stats.total_amount, Money::from_major(1400));
        assert_eq!(stats.payment_count, 4);
        assert_eq!(stats.average_amount, Money::from_str_exact("166.67").unwrap());
        assert_eq!(stats.this_month_total, Money::from_major(300));
        assert_eq!(stats.previous_month_total, Money::from_major(200));
        assert_eq!(stats.growth_rate.map(|r| r.as_decimal()), Some(dec!(0.5)));
    }
}
