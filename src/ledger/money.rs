use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Default number of fractional digits (cents).
pub const DEFAULT_MINOR_DIGITS: u32 = 2;

/// An exact amount held as an integer count of minor units.
///
/// Sums never touch floating point; conversion to decimal text happens only
/// when presenting a value. Arithmetic saturates at the `i64` bounds instead of
/// wrapping; with rule amounts capped at [`Money::MAX_RULE_AMOUNT`] a sum needs
/// millions of maximal entries before it gets there.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    /// Largest amount a recurring rule may carry (10^12 minor units).
    pub const MAX_RULE_AMOUNT: Money = Money(1_000_000_000_000);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Parses decimal text such as `"1200.55"` with `digits` fractional digits.
    /// Extra precision is rejected rather than rounded.
    pub fn parse(text: &str, digits: u32) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidAmount(text.to_string());
        let value = Decimal::from_str(text.trim()).map_err(|_| invalid())?;
        Self::from_decimal(value, digits).ok_or_else(invalid)
    }

    pub fn from_decimal(value: Decimal, digits: u32) -> Option<Self> {
        let scaled = value.checked_mul(Decimal::from(10i64.checked_pow(digits)?))?;
        if scaled.fract() != Decimal::ZERO {
            return None;
        }
        i64::try_from(scaled).ok().map(Self)
    }

    pub fn to_decimal(self, digits: u32) -> Decimal {
        Decimal::new(self.0, digits)
    }

    /// `self` as a percentage of `whole`, rounded to two places.
    pub fn percent_of(self, whole: Money) -> Option<Decimal> {
        if whole.0 == 0 {
            return None;
        }
        let ratio = Decimal::from(self.0).checked_div(Decimal::from(whole.0))?;
        Some(
            (ratio * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal(DEFAULT_MINOR_DIGITS))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}
