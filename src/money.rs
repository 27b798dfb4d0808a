use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// An exact amount whose cent count does not fit in an `i64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("amount is too large to be represented in cents")]
pub struct MoneyOverflow;

/// An amount of money stored as a whole number of cents.
///
/// Every amount the engine hands out goes through [`Money::round_half_up`],
/// so balances, settlements and statistics all share one rounding rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    /// Smallest amount considered an outstanding balance (0.01).
    pub const EPSILON: Self = Self(1);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Rounds an exact amount to cents, sending ties toward positive infinity
    /// (`floor(x * 100 + 0.5)`), so `-0.125` becomes `-0.12`.
    pub fn round_half_up(value: Decimal) -> Result<Self, MoneyOverflow> {
        value
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_add(Decimal::new(5, 1)))
            .and_then(|scaled| scaled.floor().to_i64())
            .map(Self)
            .ok_or(MoneyOverflow)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn to_f64(self) -> f64 {
        self.to_decimal().to_f64().unwrap_or_default()
    }

    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(60), 6000)]
    #[case(dec!(33.333333), 3333)]
    #[case(dec!(0.125), 13)]
    #[case(dec!(-0.125), -12)]
    #[case(dec!(-0.126), -13)]
    #[case(dec!(-14.995), -1499)]
    #[case(dec!(0.004), 0)]
    fn rounds_half_up_on_cents(#[case] value: Decimal, #[case] cents: i64) {
        assert_eq!(Money::round_half_up(value), Ok(Money::from_cents(cents)));
    }

    #[rstest]
    #[case(10_i128.pow(27))]
    #[case(-(10_i128.pow(27)))]
    #[case(10_i128.pow(17))]
    fn refuses_amounts_beyond_cent_range(#[case] units: i128) {
        let value = Decimal::from_i128_with_scale(units, 0);
        assert_eq!(Money::round_half_up(value), Err(MoneyOverflow));
    }

    #[test]
    fn abs_saturates_at_the_lower_bound() {
        assert_eq!(Money::from_cents(i64::MIN).abs(), Money::from_cents(i64::MAX));
        assert_eq!(Money::from_cents(-42).abs(), Money::from_cents(42));
    }

    #[test]
    fn displays_two_decimals() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_value(Money::from_cents(1250)).unwrap();
        assert_eq!(json, serde_json::json!(12.5));
    }

    #[test]
    fn sums_amounts() {
        let total: Money = [100, -40, 15].into_iter().map(Money::from_cents).sum();
        assert_eq!(total, Money::from_cents(75));
    }
}
