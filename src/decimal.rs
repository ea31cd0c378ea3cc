use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use crate::errors::{LedgerError, Result};

/// currency scale: everything is cents
pub const CURRENCY_SCALE: u32 = 2;

/// Money type with a fixed 2 decimal place scale for cent-level accuracy.
/// Signed: balances and deltas may be negative, amounts go through `normalize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const CENT: Money = Money(Decimal::from_parts(1, 0, 0, false, 2));

    /// pin a raw decimal to scale 2 under the given rounding strategy
    fn pinned(raw: Decimal, strategy: RoundingStrategy) -> Decimal {
        let mut d = raw.round_dp_with_strategy(CURRENCY_SCALE, strategy);
        d.rescale(CURRENCY_SCALE);
        d
    }

    /// validation gate for caller-supplied amounts: HALF_UP to 2 decimals,
    /// negative values are rejected
    pub fn normalize(raw: Decimal) -> Result<Self> {
        let d = Self::pinned(raw, RoundingStrategy::MidpointAwayFromZero);
        if d < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount { amount: raw });
        }
        Ok(Money(d))
    }

    /// create from decimal, HALF_UP to 2 decimals, sign preserved
    pub fn from_decimal(d: Decimal) -> Self {
        Money(Self::pinned(d, RoundingStrategy::MidpointAwayFromZero))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> std::result::Result<Self, rust_decimal::Error> {
        Ok(Money::from_decimal(Decimal::from_str(s)?))
    }

    /// create from whole currency units
    pub fn from_major(amount: i64) -> Self {
        Money(Self::pinned(
            Decimal::from(amount),
            RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    /// create from cents
    pub fn from_minor(cents: i64) -> Self {
        Money(Decimal::new(cents, CURRENCY_SCALE))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// value in cents; `None` when the cent count does not fit an i64
    pub fn cents(&self) -> Option<i64> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|d| d.to_i64())
    }

    /// multiply by numerator/denominator, rounding the result to 2 decimals
    /// with the given strategy; the denominator must be non-zero
    pub fn mul_fraction(
        &self,
        numerator: Decimal,
        denominator: Decimal,
        strategy: RoundingStrategy,
    ) -> Self {
        Money(Self::pinned(self.0 * numerator / denominator, strategy))
    }

    /// check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// check if strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// check if strictly negative
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// absolute value
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// minimum of two values
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// maximum of two values
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money::from_decimal(self.0 + other.0)
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
        Money::from_decimal(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        *self = *self - other;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money::from_decimal(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}
