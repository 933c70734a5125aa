//! Money and currency value objects.

use serde::{Deserialize, Serialize};

/// Money amount in minor units (cents, kobo, ...) to avoid floating point issues.
///
/// Amounts are signed so ledger reversals can carry negated values.
/// The arithmetic operators saturate at the `i64` bounds; pricing code uses
/// the `checked_*` methods so overflow is reported instead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from minor units.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new Money amount from a whole major-unit value.
    pub fn from_major(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion.
    pub fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor-unit remainder after the major portion.
    pub fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the amount with its sign flipped.
    pub fn negate(&self) -> Money {
        Money(self.0.saturating_neg())
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(&self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Scales by a rate in basis points, rounding half up, or `None` on overflow.
    pub fn checked_basis_points(&self, bps: u32) -> Option<Money> {
        let scaled = i128::from(self.0) * i128::from(bps);
        let rounded = (scaled + 5_000).div_euclid(10_000);
        i64::try_from(rounded).ok().map(Money)
    }

    /// Parses a decimal string such as `"1500"`, `"1500.5"` or `"-12.34"`.
    ///
    /// At most two fractional digits are accepted; anything finer is
    /// rejected rather than rounded.
    pub fn parse_decimal(s: &str) -> Option<Money> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let whole: i64 = whole.parse().ok()?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        let cents = whole.checked_mul(100)?.checked_add(frac)?;
        Some(Money(if negative { -cents } else { cents }))
    }

    /// Parses a JSON number or numeric string.
    pub fn from_json(value: &serde_json::Value) -> Option<Money> {
        match value {
            serde_json::Value::Number(n) => Self::parse_decimal(&n.to_string()),
            serde_json::Value::String(s) => Self::parse_decimal(s),
            _ => None,
        }
    }

    /// Formats the amount as a plain decimal string (e.g. `"12.34"`).
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{sign}{}.{:02}", self.major().abs(), self.cents_part())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// ISO-4217 style currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Parses a three-letter currency code, case-insensitively.
    pub fn parse(code: &str) -> Option<Currency> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Currency(code.to_ascii_uppercase()))
        } else {
            None
        }
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.major(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.checked_multiply(3), Some(Money::from_cents(3000)));
        assert_eq!(a.negate().cents(), -1000);
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>().cents(), 2000);
    }

    #[test]
    fn test_overflow_is_reported_or_saturated() {
        let huge = Money::from_major(100_000_000_000);
        assert_eq!(huge.checked_multiply(u32::MAX), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);

        assert_eq!((Money::from_cents(i64::MAX) + Money::from_cents(1)).cents(), i64::MAX);
        assert_eq!(Money::from_major(i64::MAX).cents(), i64::MAX);
        assert_eq!(Money::from_cents(i64::MIN).negate().cents(), i64::MAX);
    }

    #[test]
    fn test_basis_points() {
        assert_eq!(
            Money::from_cents(10_000).checked_basis_points(750),
            Some(Money::from_cents(750))
        );
        assert_eq!(Money::from_cents(333).checked_basis_points(5_000), Some(Money::from_cents(167)));
        assert_eq!(Money::from_cents(i64::MAX).checked_basis_points(20_000), None);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Money::parse_decimal("1500"), Some(Money::from_cents(150_000)));
        assert_eq!(Money::parse_decimal("1500.5"), Some(Money::from_cents(150_050)));
        assert_eq!(Money::parse_decimal("12.34"), Some(Money::from_cents(1234)));
        assert_eq!(Money::parse_decimal("-0.05"), Some(Money::from_cents(-5)));
        assert_eq!(Money::parse_decimal("1.234"), None);
        assert_eq!(Money::parse_decimal("abc"), None);
        assert_eq!(Money::parse_decimal(".5"), None);
        assert_eq!(Money::parse_decimal("1e3"), None);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            Money::from_json(&serde_json::json!(2500)),
            Some(Money::from_cents(250_000))
        );
        assert_eq!(
            Money::from_json(&serde_json::json!(19.99)),
            Some(Money::from_cents(1999))
        );
        assert_eq!(
            Money::from_json(&serde_json::json!("19.99")),
            Some(Money::from_cents(1999))
        );
        assert_eq!(Money::from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::parse("ngn").unwrap().as_str(), "NGN");
        assert_eq!(Currency::parse(" USD ").unwrap().as_str(), "USD");
        assert!(Currency::parse("US").is_none());
        assert!(Currency::parse("U5D").is_none());
    }
}
