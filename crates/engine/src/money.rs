use std::{fmt, str::FromStr};

use crate::{Currency, EngineError};

/// Signed amount in integer cents.
///
/// Bank adapters hand amounts to the import pipeline as decimal strings; this
/// type turns them into the integer cents every booking entry and unbooked
/// transaction stores.
///
/// The sign follows the bank's view of the account: positive is a credit
/// (money in), negative a debit (money out).
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("-12,34".parse::<MoneyCents>().unwrap().cents(), -1234);
/// assert_eq!("1'000.5".parse::<MoneyCents>().unwrap().cents(), 100_050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Formats the amount followed by the currency code, e.g. `-50.00 EUR`.
    #[must_use]
    pub fn display_in(self, currency: Currency) -> String {
        format!("{self} {}", currency.code())
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// The last `.` or `,` is the decimal separator; spaces and `'` are
    /// accepted as thousands grouping. At most two fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::Validation(format!("invalid amount: {s:?}"));

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let digits: String = digits
            .chars()
            .filter(|c| !matches!(c, ' ' | '\''))
            .collect();
        if digits.is_empty() {
            return Err(invalid());
        }

        let (whole, fraction) = match digits.rfind(['.', ',']) {
            Some(pos) => (&digits[..pos], &digits[pos + 1..]),
            None => (digits.as_str(), ""),
        };
        if whole.is_empty()
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let cents = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            2 => fraction.parse::<i64>().map_err(|_| invalid())?,
            _ => {
                return Err(EngineError::Validation(format!(
                    "too many decimals: {s:?}"
                )));
            }
        };

        let total = whole
            .parse::<i64>()
            .ok()
            .and_then(|units| units.checked_mul(100))
            .and_then(|units| units.checked_add(cents))
            .ok_or_else(|| EngineError::Validation(format!("amount too large: {s:?}")))?;

        Ok(MoneyCents(if negative { -total } else { total }))
    }
}
