//! Amount type for handling monetary values.
//!
//! The server stores amounts as fixed-point decimals with two places and sends them as strings,
//! e.g. `"500.00"`. It accepts either strings or numbers. This module provides the `Amount` type
//! which wraps `Decimal` and handles both.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Number of decimal places the server keeps.
const DECIMAL_PLACES: u32 = 2;

/// Represents a money amount.
///
/// # Examples
///
/// ```
/// # use goalcrest::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("500").unwrap();
/// assert_eq!(amount.to_string(), "500.00");
/// assert_eq!(amount.to_commas_string(), "500.00");
///
/// let big = Amount::from_str("1,234,567.5").unwrap();
/// assert_eq!(big.to_string(), "1234567.50");
/// assert_eq!(big.to_commas_string(), "1,234,567.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const ZERO: Amount = Amount::new(Decimal::ZERO);

    /// Creates a new Amount from a Decimal value.
    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value.is_sign_negative()
    }

    /// Formats with thousands separators, e.g. `-60,000.00`.
    pub fn to_commas_string(&self) -> String {
        let sign = if self.is_negative() { "-" } else { "" };
        let abs = self.value.abs();
        format!(
            "{sign}{}",
            format_num::format_num!(",.2", abs.to_f64().unwrap_or_default())
        )
    }

    fn rounded(&self) -> Decimal {
        let mut v = self
            .value
            .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        v.rescale(DECIMAL_PLACES);
        v
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let without_commas = trimmed.replace(',', "");
        let value = Decimal::from_str(&without_commas).map_err(AmountError)?;
        Ok(Amount::new(value))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rounded())
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or a string containing one")
    }

    fn visit_str<E>(self, v: &str) -> Result<Amount, E>
    where
        E: serde::de::Error,
    {
        Amount::from_str(v).map_err(E::custom)
    }

    fn visit_i64<E>(self, v: i64) -> Result<Amount, E>
    where
        E: serde::de::Error,
    {
        Ok(Amount::new(Decimal::from(v)))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Amount, E>
    where
        E: serde::de::Error,
    {
        Ok(Amount::new(Decimal::from(v)))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Amount, E>
    where
        E: serde::de::Error,
    {
        Decimal::from_f64(v)
            .map(Amount::new)
            .ok_or_else(|| E::custom(format!("{v} cannot be represented as a decimal")))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount::new(Decimal::from(value))
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new(self.value + rhs.value)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount::new(self.value - rhs.value)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}
