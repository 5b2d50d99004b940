use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};
use std::str::FromStr;

/// number of decimal places kept for currency amounts
pub const MONEY_SCALE: u32 = 2;

/// Money type with cent precision, matching a NUMERIC(10,2) ledger column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// exclusive upper bound of a single recorded amount (10^8, eight integer digits)
    pub const LIMIT: Money = Money(Decimal::from_parts(100_000_000, 0, 0, false, 0));

    /// create from decimal, rounding to cents
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.round_dp(MONEY_SCALE))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str(s.trim())?.round_dp(MONEY_SCALE)))
    }

    /// create from whole currency units
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from cents
    pub fn from_minor(cents: i64) -> Self {
        Money(Decimal::new(cents, MONEY_SCALE))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// strictly less than zero
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// fits the ledger column: below [`Money::LIMIT`] in magnitude
    pub fn is_recordable(&self) -> bool {
        self.0.abs() < Money::LIMIT.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(|d| Money(d.round_dp(MONEY_SCALE)))
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(|d| Money(d.round_dp(MONEY_SCALE)))
    }

    /// clamp into [lower, upper]
    pub fn clamp_to(self, lower: Self, upper: Self) -> Self {
        self.max(lower).min(upper)
    }

    /// mean of a total over a count, zero when count is zero
    pub fn average(total: Money, count: usize) -> Money {
        if count == 0 {
            return Money::ZERO;
        }
        total / Decimal::from(count as u64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i32> for Money {
    fn from(i: i32) -> Self {
        Money::from_major(i as i64)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_major(i as i64)
    }
}

// operators saturate at the decimal range instead of panicking
fn saturate(result: Option<Decimal>, positive: bool) -> Money {
    match result {
        Some(d) => Money(d.round_dp(MONEY_SCALE)),
        None if positive => Money(Decimal::MAX),
        None => Money(Decimal::MIN),
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        saturate(self.0.checked_add(other.0), other.0.is_sign_positive())
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        saturate(self.0.checked_sub(other.0), other.0.is_sign_negative())
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        *self = *self - other;
    }
}

impl Div<Decimal> for Money {
    type Output = Money;

    /// division by zero yields zero
    fn div(self, other: Decimal) -> Money {
        self.0
            .checked_div(other)
            .map(|d| Money(d.round_dp(MONEY_SCALE)))
            .unwrap_or(Money::ZERO)
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, other: Decimal) -> Money {
        saturate(
            self.0.checked_mul(other),
            self.0.is_sign_positive() == other.is_sign_positive(),
        )
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

/// rate type for ratios such as collection rate and growth
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// create from decimal (e.g., 0.05 for 5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// numerator / denominator, None when the denominator is not positive
    pub fn ratio(numerator: Money, denominator: Money) -> Option<Rate> {
        if !denominator.is_positive() {
            return None;
        }
        numerator
            .as_decimal()
            .checked_div(denominator.as_decimal())
            .map(|r| Rate(r.round_dp(6)))
    }

    /// relative change from previous to current
    pub fn growth(previous: Money, current: Money) -> Option<Rate> {
        Rate::ratio(current - previous, previous)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().round_dp(2))
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_precision() {
        let m = Money::from_str_exact("100.129").unwrap();
        assert_eq!(m.to_string(), "100.13");

        let cents = Money::from_minor(4_050);
        assert_eq!(cents, Money::from_decimal(dec!(40.50)));
    }

    #[test]
    fn test_zero_is_not_positive() {
        assert!(!Money::ZERO.is_positive());
        assert!(!Money::ZERO.is_negative());
        assert!(Money::from_minor(1).is_positive());
        assert!((Money::ZERO - Money::from_minor(1)).is_negative());
    }

    #[test]
    fn test_sum_and_average() {
        let amounts = vec![Money::from_major(40), Money::from_major(60), Money::from_minor(1)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total, Money::from_str_exact("100.01").unwrap());

        assert_eq!(Money::average(Money::from_major(100), 3), Money::from_str_exact("33.33").unwrap());
        assert_eq!(Money::average(Money::from_major(100), 0), Money::ZERO);
    }

    #[test]
    fn test_clamp() {
        let total = Money::from_major(100);
        assert_eq!(Money::from_major(120).clamp_to(Money::ZERO, total), total);
        assert_eq!((Money::ZERO - Money::from_major(5)).clamp_to(Money::ZERO, total), Money::ZERO);
    }

    #[test]
    fn test_recordable_bound() {
        assert!(Money::from_str_exact("99999999.99").unwrap().is_recordable());
        assert!(!Money::from_major(100_000_000).is_recordable());
        assert!(!Money::from_str_exact("50000000000000000000000000000").unwrap().is_recordable());
    }

    #[test]
    fn test_arithmetic_saturates_instead_of_panicking() {
        let huge = Money::from_decimal(Decimal::MAX);
        assert_eq!(huge.checked_add(Money::from_major(1)), None);
        assert_eq!(huge + huge, huge);
        assert_eq!(vec![huge, huge, huge].into_iter().sum::<Money>(), huge);
        assert_eq!(Money::from_decimal(Decimal::MIN) - huge, Money::from_decimal(Decimal::MIN));
        assert_eq!(
            Money::from_major(2).checked_sub(Money::from_major(5)),
            Some(Money::from_major(-3))
        );
        assert_eq!(Money::from_major(10) / Decimal::ZERO, Money::ZERO);
    }

    #[test]
    fn test_rates() {
        let rate = Rate::ratio(Money::from_major(50), Money::from_major(200)).unwrap();
        assert_eq!(rate.as_decimal(), dec!(0.25));
        assert_eq!(rate.as_percentage(), dec!(25));

        assert!(Rate::ratio(Money::from_major(1), Money::ZERO).is_none());

        let growth = Rate::growth(Money::from_major(100), Money::from_major(150)).unwrap();
        assert_eq!(growth.as_decimal(), dec!(0.5));
    }
}
