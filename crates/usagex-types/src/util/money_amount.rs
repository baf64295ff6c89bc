//! Human-readable currency amount parsing.
//!
//! [`MoneyAmount`] turns strings such as `"30"`, `"1.5"` or `"$1,000.25"` into a
//! precise decimal, which is then scaled to a token's smallest unit with
//! [`MoneyAmount::to_token_units`].
//!
//! ```rust
//! use alloy_primitives::U256;
//! use usagex_types::util::MoneyAmount;
//!
//! let amount = MoneyAmount::parse("$10.50").unwrap();
//! assert_eq!(amount.scale(), 2);
//! assert_eq!(amount.mantissa(), 1050);
//! assert_eq!(amount.to_token_units(6).unwrap(), U256::from(10_500_000u64));
//! ```

use alloy_primitives::U256;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

/// Decimals of the USDC-style stablecoin the ledger is normally deployed against.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// A parsed, non-negative monetary amount.
///
/// The original precision is preserved: `"10.50"` has scale 2 and mantissa 1050.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

impl MoneyAmount {
    /// Number of decimal places in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// The value as an unsigned integer, without decimal point.
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }
}

/// Errors that can occur when parsing a monetary amount.
#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error("Amount must not exceed {}", constants::MAX_STR)]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    /// The input has more decimal places than the token supports.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision { money: u32, token: u32 },
}

mod constants {
    use super::*;

    pub const MAX_STR: &str = "999999999999";

    pub static MAX: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));

    pub static NOISE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\d\.\-]+").expect("valid regex"));
}

impl MoneyAmount {
    /// Parses a human-readable currency string.
    ///
    /// Currency symbols, thousand separators and whitespace are stripped before
    /// parsing. Zero is a valid amount (a settlement may report no usage).
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned = constants::NOISE.replace_all(input, "").to_string();

        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;

        if parsed.is_sign_negative() && !parsed.is_zero() {
            return Err(MoneyAmountParseError::Negative);
        }

        if parsed > *constants::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }

        Ok(MoneyAmount(parsed))
    }

    /// Scales the amount to a token's smallest unit.
    ///
    /// Fails with [`MoneyAmountParseError::WrongPrecision`] when the input
    /// carries more decimal places than the token has.
    pub fn to_token_units(&self, decimals: u8) -> Result<U256, MoneyAmountParseError> {
        let scale = self.scale();
        let token_scale = decimals as u32;
        if scale > token_scale {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token: token_scale,
            });
        }
        let multiplier = U256::from(10).pow(U256::from(token_scale - scale));
        Ok(U256::from(self.mantissa()) * multiplier)
    }
}

/// Renders a smallest-unit token amount with the token's decimals, e.g.
/// `70000000` with 6 decimals becomes `"70"`, `1500000` becomes `"1.5"`.
pub fn format_token_units(amount: U256, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MoneyAmount::from_str(value)
    }
}

impl From<u128> for MoneyAmount {
    fn from(value: u128) -> Self {
        MoneyAmount(Decimal::from(value))
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Serialize for MoneyAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MoneyAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MoneyAmount::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(input: &str, decimals: u8) -> Result<U256, MoneyAmountParseError> {
        MoneyAmount::parse(input)?.to_token_units(decimals)
    }

    #[test]
    fn test_parse_whole_number() {
        assert_eq!(units("100", 6).unwrap(), U256::from(100_000_000u64));
    }

    #[test]
    fn test_parse_with_decimals() {
        assert_eq!(units("1.50", 6).unwrap(), U256::from(1_500_000u64));
    }

    #[test]
    fn test_parse_zero_is_allowed() {
        assert_eq!(units("0", 6).unwrap(), U256::ZERO);
        assert_eq!(units("0.00", 6).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_parse_precision_too_high() {
        let err = units("1.234", 2).unwrap_err();
        assert!(matches!(
            err,
            MoneyAmountParseError::WrongPrecision { money: 3, token: 2 }
        ));
    }

    #[test]
    fn test_parse_smallest_amount() {
        assert_eq!(units("0.000001", 6).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_with_currency_symbol_and_commas() {
        assert_eq!(units("$10.50", 6).unwrap(), U256::from(10_500_000u64));
        assert_eq!(units("1,000", 6).unwrap(), U256::from(1_000_000_000u64));
    }

    #[test]
    fn test_parse_negative_rejected() {
        assert!(matches!(
            MoneyAmount::parse("-5"),
            Err(MoneyAmountParseError::Negative)
        ));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(
            MoneyAmount::parse("1000000000000"),
            Err(MoneyAmountParseError::OutOfRange)
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            MoneyAmount::parse("abc"),
            Err(MoneyAmountParseError::InvalidFormat)
        ));
    }

    #[test]
    fn test_format_token_units() {
        assert_eq!(format_token_units(U256::from(70_000_000u64), 6), "70");
        assert_eq!(format_token_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_token_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_token_units(U256::ZERO, 6), "0");
        assert_eq!(format_token_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_serde_as_string() {
        let amount: MoneyAmount = serde_json::from_str(r#""$1,000.5""#).unwrap();
        assert_eq!(amount.to_token_units(6).unwrap(), U256::from(1_000_500_000u64));
        assert_eq!(serde_json::to_string(&amount).unwrap(), r#""1000.5""#);
        assert!(serde_json::from_str::<MoneyAmount>(r#""-1""#).is_err());
    }
}
