use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const USD_CURRENCY_CODE: &str = "usd";

//--------------------------------------       Money         ---------------------------------------------------------
/// A monetary amount, held as a count of minor currency units (cents).
///
/// The local ledger, the platform-fee split and the payment-processor boundary all work in minor units, so
/// percentage splits are exact integer arithmetic and no penny is ever lost between the two ledgers. Major-unit
/// (dollar) values only exist at the input and display edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor currency units: {0}")]
pub struct MoneyConversionError(pub String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    /// The amount in minor units. This is the value sent to the payment gateway.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_minor(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    /// Converts a fractional major-unit amount into minor units, rounding half-up.
    ///
    /// Non-finite inputs (NaN, ±∞) and values outside the `i64` minor-unit range are rejected.
    pub fn from_major_f64(amount: f64) -> Result<Self, MoneyConversionError> {
        if !amount.is_finite() {
            return Err(MoneyConversionError(format!("'{amount}' is not a finite amount")));
        }
        let minor = (amount * 100.0 + 0.5).floor();
        if minor < i64::MIN as f64 || minor > i64::MAX as f64 {
            return Err(MoneyConversionError(format!("'{amount}' is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(minor as i64))
    }

    /// The amount in major units. Lossy for display only; ledger arithmetic stays in minor units.
    pub fn to_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Takes an integer percentage of the amount, rounding half-up.
    ///
    /// `amount.percent(p) + amount.percent(100 - p)` does not always equal `amount`; compute one share and
    /// subtract to get the complement.
    pub fn percent(&self, pct: i64) -> Self {
        // Widened so the product cannot wrap for amounts near the i64 limit.
        let share = (i128::from(self.0) * i128::from(pct) + 50).div_euclid(100);
        #[allow(clippy::cast_possible_truncation)]
        Self(share as i64)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
