// crates/bulwark-core/src/decimal.rs
//
// Deterministic 18-decimal fixed-point arithmetic.
//
// Every monetary formula in the engine (exchange rates, commission, inflation,
// reward-per-share) goes through this module so that all replicas round the
// same way. Division always truncates toward zero. Products are computed in
// 256 bits before dividing, so `amount * amount / amount` never overflows on
// the way; a final result that does not fit in u128 saturates.

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional decimal digits carried by `Dec`.
pub const DECIMAL_PLACES: u32 = 18;

/// 10^18, the raw representation of `Dec::ONE`.
pub const DECIMAL_FRACTIONAL: u128 = 1_000_000_000_000_000_000;

fn saturate(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.as_u128()
    }
}

/// `a * b / c`, truncating. Returns 0 when `c` is 0.
pub fn mul_div(a: u128, b: u128, c: u128) -> u128 {
    if c == 0 {
        return 0;
    }
    saturate(U256::from(a) * U256::from(b) / U256::from(c))
}

/// `a * b / c`, rounding up. Returns 0 when `c` is 0.
pub fn mul_div_ceil(a: u128, b: u128, c: u128) -> u128 {
    if c == 0 {
        return 0;
    }
    let c = U256::from(c);
    saturate((U256::from(a) * U256::from(b) + c - U256::one()) / c)
}

/// Non-negative fixed-point decimal with 18 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Dec(u128);

impl Dec {
    pub const ZERO: Dec = Dec(0);
    pub const ONE: Dec = Dec(DECIMAL_FRACTIONAL);

    /// Wrap a raw 10^18-scaled value.
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Whole number `n` as a decimal (saturating).
    pub fn from_int(n: u128) -> Self {
        Self(n.saturating_mul(DECIMAL_FRACTIONAL))
    }

    /// `p` percent, e.g. `Dec::percent(2) == 0.02`.
    pub const fn percent(p: u64) -> Self {
        Self(p as u128 * (DECIMAL_FRACTIONAL / 100))
    }

    /// `numerator / denominator`, truncating. Zero when the denominator is zero.
    pub fn from_ratio(numerator: u128, denominator: u128) -> Self {
        Self(mul_div(numerator, DECIMAL_FRACTIONAL, denominator))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Dec) -> Dec {
        Dec(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Dec) -> Dec {
        Dec(self.0.saturating_sub(other.0))
    }

    pub fn checked_sub(self, other: Dec) -> Option<Dec> {
        self.0.checked_sub(other.0).map(Dec)
    }

    /// `|self - other|`.
    pub fn abs_diff(self, other: Dec) -> Dec {
        Dec(self.0.abs_diff(other.0))
    }

    /// Decimal product, truncating.
    pub fn mul(self, other: Dec) -> Dec {
        Dec(mul_div(self.0, other.0, DECIMAL_FRACTIONAL))
    }

    /// Decimal quotient, truncating. `None` on division by zero.
    pub fn checked_div(self, other: Dec) -> Option<Dec> {
        if other.is_zero() {
            return None;
        }
        Some(Dec(mul_div(self.0, DECIMAL_FRACTIONAL, other.0)))
    }

    /// Divide by an integer, truncating. Zero when `n` is zero.
    pub fn div_int(self, n: u128) -> Dec {
        Dec(self.0.checked_div(n).unwrap_or(0))
    }

    /// Apply this decimal to an integer amount: `amount * self`, truncating.
    pub fn mul_int(self, amount: u128) -> u128 {
        mul_div(amount, self.0, DECIMAL_FRACTIONAL)
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / DECIMAL_FRACTIONAL;
        let frac = self.0 % DECIMAL_FRACTIONAL;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            let frac_str = format!("{:018}", frac);
            write!(f, "{}.{}", whole, frac_str.trim_end_matches('0'))
        }
    }
}

/// Failure to parse a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decimal {input:?}: {reason}")]
pub struct ParseDecError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for Dec {
    type Err = ParseDecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| ParseDecError {
            input: s.to_string(),
            reason,
        };
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("whole part must be digits"));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("fractional part must be digits"));
        }
        if frac.len() > DECIMAL_PLACES as usize {
            return Err(fail("more than 18 fractional digits"));
        }
        let whole: u128 = whole.parse().map_err(|_| fail("whole part out of range"))?;
        let frac_raw: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<18}", frac);
            padded.parse().map_err(|_| fail("fractional part out of range"))?
        };
        whole
            .checked_mul(DECIMAL_FRACTIONAL)
            .and_then(|w| w.checked_add(frac_raw))
            .map(Dec)
            .ok_or_else(|| fail("value out of range"))
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(dec("0.05").raw(), 50_000_000_000_000_000);
        assert_eq!(dec("1").raw(), DECIMAL_FRACTIONAL);
        assert_eq!(dec("0.029971542401821286").to_string(), "0.029971542401821286");
        assert_eq!(dec("12.500").to_string(), "12.5");
        assert_eq!(Dec::ZERO.to_string(), "0");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Dec>().is_err());
        assert!("-1".parse::<Dec>().is_err());
        assert!("1.2.3".parse::<Dec>().is_err());
        assert!("0.0000000000000000001".parse::<Dec>().is_err());
    }

    #[test]
    fn test_percent() {
        assert_eq!(Dec::percent(2), dec("0.02"));
        assert_eq!(Dec::percent(100), Dec::ONE);
    }

    #[test]
    fn test_from_ratio_truncates() {
        assert_eq!(Dec::from_ratio(1, 3).raw(), 333_333_333_333_333_333);
        assert_eq!(Dec::from_ratio(5, 0), Dec::ZERO);
    }

    #[test]
    fn test_mul_and_div() {
        assert_eq!(dec("0.5").mul(dec("0.5")), dec("0.25"));
        assert_eq!(dec("1").checked_div(dec("0.35")).unwrap().raw(), 2_857_142_857_142_857_142);
        assert_eq!(dec("1").checked_div(Dec::ZERO), None);
        assert_eq!(dec("0.05").div_int(5), dec("0.01"));
    }

    #[test]
    fn test_mul_int_large_amounts_do_not_overflow() {
        // 10^24 tokens * 0.5 needs more than 128 bits before the division.
        let amount: u128 = 1_000_000 * DECIMAL_FRACTIONAL;
        assert_eq!(dec("0.5").mul_int(amount), amount / 2);
    }

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div(10, 1, 3), 3);
        assert_eq!(mul_div_ceil(10, 1, 3), 4);
        assert_eq!(mul_div_ceil(9, 1, 3), 3);
        assert_eq!(mul_div(1, 1, 0), 0);
    }

    #[test]
    fn test_abs_diff_and_bounds() {
        assert_eq!(dec("0.3").abs_diff(dec("0.4")), dec("0.1"));
        assert_eq!(dec("0.3").min(dec("0.4")), dec("0.3"));
        assert_eq!(dec("0.3").max(dec("0.4")), dec("0.4"));
        assert_eq!(dec("0.3").checked_sub(dec("0.4")), None);
    }
}
