//! Fixed-point money type.
//!
//! All monetary amounts (accruals, balances, withdrawals) use a 1e-6
//! (micros) fixed-point representation stored as `i64`, both in memory and
//! in the `*_micros` BIGINT columns. `Micros` wraps the raw integer so the
//! type system keeps money apart from row IDs and counters.
//!
//! # Wire format
//!
//! On the JSON boundary an amount is a plain number (`42.5`). Deserializing
//! rounds to the nearest micro; serializing emits an `f64`. Exact decimal
//! input (CLI flags, config) goes through [`Micros::parse_decimal`], which
//! never touches floating point.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 1 unit = 1_000_000 micros.
pub const MICROS_SCALE: i64 = 1_000_000;

// ---------------------------------------------------------------------------
// Micros newtype
// ---------------------------------------------------------------------------

/// A fixed-point monetary amount at 1e-6 scale.
///
/// There is intentionally no `From<i64>`; use [`Micros::new`] when a raw
/// integer is known to be a micro amount, or [`Micros::from_units`] for
/// whole units.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);

    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Whole currency units (e.g. `from_units(100)` == 100.000000).
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Micros(units * MICROS_SCALE)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_add(rhs.0).map(Micros)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_sub(rhs.0).map(Micros)
    }

    /// Lossy conversion used only for JSON output.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / MICROS_SCALE as f64
    }

    /// Convert a floating amount (as decoded from JSON) to micros, rounding
    /// half away from zero. Rejects NaN, infinities and out-of-range values.
    pub fn from_f64(v: f64) -> Result<Self, MoneyParseError> {
        if !v.is_finite() {
            return Err(MoneyParseError::NotFinite);
        }
        let scaled = (v * MICROS_SCALE as f64).round();
        if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
            return Err(MoneyParseError::Overflow);
        }
        Ok(Micros(scaled as i64))
    }

    /// Parse a decimal string (`"42"`, `"42.5"`, `"-0.000001"`) exactly.
    ///
    /// More than six fractional digits is rejected rather than rounded.
    pub fn parse_decimal(s: &str) -> Result<Self, MoneyParseError> {
        let s = s.trim();
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            Some(_) => (false, s),
            None => return Err(MoneyParseError::Empty),
        };

        let mut parts = body.split('.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return Err(MoneyParseError::Malformed);
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(MoneyParseError::Malformed);
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(MoneyParseError::Malformed);
        }
        if frac_part.len() > 6 {
            return Err(MoneyParseError::TooManyDecimals);
        }

        let int_val: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| MoneyParseError::Overflow)?
        };
        let mut frac_val: i64 = 0;
        for (i, b) in frac_part.bytes().enumerate() {
            frac_val += i64::from(b - b'0') * 10_i64.pow(5 - i as u32);
        }

        let raw = int_val
            .checked_mul(MICROS_SCALE)
            .and_then(|v| v.checked_add(frac_val))
            .ok_or(MoneyParseError::Overflow)?;

        Ok(Micros(if negative { -raw } else { raw }))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    Empty,
    Malformed,
    TooManyDecimals,
    NotFinite,
    Overflow,
}

impl fmt::Display for MoneyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty amount"),
            Self::Malformed => write!(f, "malformed decimal amount"),
            Self::TooManyDecimals => write!(f, "amount has more than 6 decimal places"),
            Self::NotFinite => write!(f, "amount is not a finite number"),
            Self::Overflow => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for MoneyParseError {}

// ---------------------------------------------------------------------------
// Arithmetic (closed over Micros)
// ---------------------------------------------------------------------------

impl Add for Micros {
    type Output = Micros;
    #[inline]
    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0 + rhs.0)
    }
}

impl Sub for Micros {
    type Output = Micros;
    #[inline]
    fn sub(self, rhs: Micros) -> Micros {
        Micros(self.0 - rhs.0)
    }
}

impl AddAssign for Micros {
    #[inline]
    fn add_assign(&mut self, rhs: Micros) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Micros {
    #[inline]
    fn sub_assign(&mut self, rhs: Micros) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Micros {
    fn sum<I: Iterator<Item = Micros>>(iter: I) -> Micros {
        iter.fold(Micros::ZERO, |acc, m| acc + m)
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Shortest exact decimal form: `42.5`, `100`, `-0.000001`.
impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / MICROS_SCALE as u64;
        let frac = abs % MICROS_SCALE as u64;
        if frac == 0 {
            return write!(f, "{sign}{units}");
        }
        let frac_s = format!("{frac:06}");
        write!(f, "{sign}{units}.{}", frac_s.trim_end_matches('0'))
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for Micros {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

struct MicrosVisitor;

impl<'de> Visitor<'de> for MicrosVisitor {
    type Value = Micros;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a monetary amount as a JSON number")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Micros, E> {
        v.checked_mul(MICROS_SCALE)
            .map(Micros)
            .ok_or_else(|| E::custom(MoneyParseError::Overflow))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Micros, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(MICROS_SCALE))
            .map(Micros)
            .ok_or_else(|| E::custom(MoneyParseError::Overflow))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Micros, E> {
        Micros::from_f64(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Micros {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MicrosVisitor)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decimal_basic() {
        assert_eq!(Micros::parse_decimal("0").unwrap(), Micros::ZERO);
        assert_eq!(Micros::parse_decimal("1").unwrap(), Micros::new(1_000_000));
        assert_eq!(Micros::parse_decimal("42.5").unwrap(), Micros::new(42_500_000));
        assert_eq!(Micros::parse_decimal("001.2300").unwrap(), Micros::new(1_230_000));
        assert_eq!(Micros::parse_decimal(".5").unwrap(), Micros::new(500_000));
        assert_eq!(Micros::parse_decimal("+5.000001").unwrap(), Micros::new(5_000_001));
        assert_eq!(Micros::parse_decimal("-2.75").unwrap(), Micros::new(-2_750_000));
    }

    #[test]
    fn parse_decimal_rejects_garbage() {
        assert_eq!(Micros::parse_decimal(""), Err(MoneyParseError::Empty));
        assert_eq!(Micros::parse_decimal("."), Err(MoneyParseError::Malformed));
        assert_eq!(Micros::parse_decimal("1.2.3"), Err(MoneyParseError::Malformed));
        assert_eq!(Micros::parse_decimal("12a"), Err(MoneyParseError::Malformed));
        assert_eq!(
            Micros::parse_decimal("1.1234567"),
            Err(MoneyParseError::TooManyDecimals)
        );
        assert_eq!(
            Micros::parse_decimal("99999999999999999999"),
            Err(MoneyParseError::Overflow)
        );
    }

    #[test]
    fn display_is_shortest_exact_form() {
        assert_eq!(Micros::new(42_500_000).to_string(), "42.5");
        assert_eq!(Micros::from_units(100).to_string(), "100");
        assert_eq!(Micros::new(-1).to_string(), "-0.000001");
        assert_eq!(Micros::ZERO.to_string(), "0");
    }

    #[test]
    fn json_number_decodes_with_rounding() {
        let m: Micros = serde_json::from_str("42.5").unwrap();
        assert_eq!(m, Micros::new(42_500_000));
        let m: Micros = serde_json::from_str("0.1").unwrap();
        assert_eq!(m, Micros::new(100_000));
        let m: Micros = serde_json::from_str("751").unwrap();
        assert_eq!(m, Micros::from_units(751));
        assert!(serde_json::from_str::<Micros>("\"12\"").is_err());
    }

    #[test]
    fn json_encodes_as_number() {
        let s = serde_json::to_string(&Micros::new(729_980_000)).unwrap();
        assert_eq!(s, "729.98");
    }

    #[test]
    fn checked_ops_detect_overflow() {
        assert_eq!(Micros::new(i64::MAX).checked_add(Micros::new(1)), None);
        assert_eq!(
            Micros::from_units(3).checked_sub(Micros::from_units(1)),
            Some(Micros::from_units(2))
        );
    }

    #[test]
    fn sum_of_amounts() {
        let total: Micros = [Micros::from_units(1), Micros::new(500_000)]
            .into_iter()
            .sum();
        assert_eq!(total, Micros::new(1_500_000));
    }
}
