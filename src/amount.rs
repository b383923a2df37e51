use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Money as a signed count of minor currency units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Amount(i64);

/// Errors parsing a major-unit decimal such as `"12.50"`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount '{0}'")]
    Invalid(String),
    #[error("amount '{0}' has more than two decimal places")]
    TooPrecise(String),
    #[error("amount '{0}' is out of range")]
    OutOfRange(String),
}

impl Amount {
    /// Minor units per major unit.
    const SCALE: i64 = 100;

    pub const ZERO: Amount = Amount(0);

    pub fn from_minor(value: i64) -> Self {
        Amount(value)
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        let whole = abs / scale;
        let frac = abs % scale;
        write!(f, "{sign}{whole}.{frac:02}")
    }
}

/// Parses a major-unit decimal into minor units without going through floats.
impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountParseError::Invalid(s.to_string()));
        }
        if frac.len() > 2 {
            return Err(AmountParseError::TooPrecise(s.to_string()));
        }

        let out_of_range = || AmountParseError::OutOfRange(s.to_string());
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        // "5" -> 50 cents, "05" -> 5 cents
        let frac: i64 = format!("{frac:0<2}").parse().map_err(|_| out_of_range())?;

        let minor = whole
            .checked_mul(Self::SCALE)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(out_of_range)?;

        Ok(Amount(if negative { -minor } else { minor }))
    }
}

impl std::ops::Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_minor_preserves_value() {
        assert_eq!(Amount::from_minor(123456).minor(), 123456);
    }

    #[test]
    fn display_formats_major_units() {
        assert_eq!(Amount::from_minor(5000).to_string(), "50.00");
        assert_eq!(Amount::from_minor(1505).to_string(), "15.05");
        assert_eq!(Amount::from_minor(1).to_string(), "0.01");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
        assert_eq!(Amount::from_minor(-250).to_string(), "-2.50");
    }

    #[test]
    fn display_handles_extremes() {
        assert_eq!(Amount::from_minor(i64::MIN).to_string(), "-92233720368547758.08");
    }

    #[test]
    fn parse_major_units() {
        assert_eq!("50".parse(), Ok(Amount::from_minor(5000)));
        assert_eq!("15.05".parse(), Ok(Amount::from_minor(1505)));
        assert_eq!("15.5".parse(), Ok(Amount::from_minor(1550)));
        assert_eq!(".25".parse(), Ok(Amount::from_minor(25)));
        assert_eq!(" 1.00 ".parse(), Ok(Amount::from_minor(100)));
        assert_eq!("-1".parse(), Ok(Amount::from_minor(-100)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("".parse::<Amount>(), Err(AmountParseError::Empty));
        assert!(matches!("abc".parse::<Amount>(), Err(AmountParseError::Invalid(_))));
        assert!(matches!(".".parse::<Amount>(), Err(AmountParseError::Invalid(_))));
        assert!(matches!("1.2.3".parse::<Amount>(), Err(AmountParseError::Invalid(_))));
        assert!(matches!("1e5".parse::<Amount>(), Err(AmountParseError::Invalid(_))));
    }

    #[test]
    fn parse_rejects_sub_cent_precision() {
        assert!(matches!("0.001".parse::<Amount>(), Err(AmountParseError::TooPrecise(_))));
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(matches!(
            "99999999999999999999".parse::<Amount>(),
            Err(AmountParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn checked_arithmetic() {
        let a = Amount::from_minor(100);
        assert_eq!(a.checked_add(Amount::from_minor(50)), Some(Amount::from_minor(150)));
        assert_eq!(a.checked_sub(Amount::from_minor(30)), Some(Amount::from_minor(70)));
        assert_eq!(Amount::from_minor(i64::MAX).checked_add(a), None);
    }

    #[test]
    fn is_positive() {
        assert!(Amount::from_minor(1).is_positive());
        assert!(!Amount::ZERO.is_positive());
        assert!(!Amount::from_minor(-100).is_positive());
    }

    #[test]
    fn neg_flips_sign() {
        assert_eq!(-Amount::from_minor(5), Amount::from_minor(-5));
    }

    #[test]
    fn ordering() {
        assert!(Amount::from_minor(100) < Amount::from_minor(200));
        assert!(Amount::from_minor(-100) < Amount::ZERO);
    }
}
