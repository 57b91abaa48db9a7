//! # Money Module
//!
//! Fixed-point money with two-decimal precision, stored as `i64` hundredths
//! of the currency unit ("cents").
//!
//! ## Why Integer Cents?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Floating point:  0.1 + 0.2 = 0.30000000000000004                       │
//! │  Integer cents:   10  + 20  = 30                                        │
//! │                                                                         │
//! │  Database columns are decimal(16,2) in spirit: an INTEGER of cents      │
//! │  holds every decimal(16,2) value exactly.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Roundings
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Storage rounding            Gateway rounding                           │
//! │  ────────────────            ────────────────                           │
//! │  half-up to 0.01             half-up to a whole unit                    │
//! │  calculate_tax, percentage   round_to_unit, to_whole_units              │
//! │                                                                         │
//! │  74666.24 stays 74666.24     74666.24 → 74666                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::TaxRate;

/// Hundredths per whole currency unit.
pub const CENTS_PER_UNIT: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in hundredths of the currency unit.
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                                                                         │
/// │  Product.price ──► CartItem.final_unit_price ──► CartItem.subtotal      │
/// │                                                       │                 │
/// │                                                       ▼                 │
/// │  Cart.base_total ──► tax ──► Cart.grand_total ──► Order.grand_total     │
/// │                                                       │                 │
/// │                                      + shipping ──────┘                 │
/// │                                                       ▼                 │
/// │                         Payment.amount ──► gateway gross (whole units)  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from hundredths of the unit.
    ///
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let price = Money::from_cents(10_000_000); // 100.000,00
    /// assert_eq!(price.units(), 100_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units * CENTS_PER_UNIT)
    }

    /// Returns the value in hundredths of the unit.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion, truncated toward zero.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / CENTS_PER_UNIT
    }

    /// Returns the fractional portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % CENTS_PER_UNIT).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    #[inline]
    pub fn non_negative(self) -> Self {
        self.max(Money::zero())
    }

    /// Calculates tax at `rate`, rounded half-up to two decimals.
    ///
    /// ```rust
    /// use storefront_core::money::Money;
    /// use storefront_core::types::TaxRate;
    ///
    /// let base = Money::from_units(200_000);
    /// let tax = base.calculate_tax(TaxRate::from_bps(1200)); // 12%
    /// assert_eq!(tax, Money::from_units(24_000));
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percentage(rate.bps())
    }

    /// Returns `bps` basis points of this amount, rounded half-up to two decimals.
    ///
    /// Used for percentage discounts: `price.percentage(1000)` is 10% of price.
    pub fn percentage(&self, bps: u32) -> Money {
        let cents = div_round_half_up(self.0 as i128 * bps as i128, 10_000);
        Money(cents as i64)
    }

    /// Multiplies by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Rounds half-up to a whole currency unit.
    ///
    /// ## Gateway Rounding
    /// ```text
    /// 37332.96 → 37333
    /// 37334.08 → 37334
    /// 74666.24 → 74666
    /// 74666.50 → 74667
    /// ```
    pub fn round_to_unit(&self) -> Money {
        let units = div_round_half_up(self.0 as i128, CENTS_PER_UNIT as i128);
        Money::from_units(units as i64)
    }

    /// Rounds half-up and returns the whole-unit count sent to the gateway.
    #[inline]
    pub fn to_whole_units(&self) -> i64 {
        self.round_to_unit().units()
    }
}

/// Integer division rounding halves away from zero.
pub(crate) fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

/// Parses a decimal string with at most two fraction digits into hundredths.
///
/// Accepts `"15000"`, `"15000.5"`, `"12.00"`, `"-1"`. Rejects empty input,
/// more than two fraction digits, and anything that is not a plain decimal.
pub(crate) fn parse_fixed2(input: &str) -> Option<i64> {
    let s = input.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > 2 || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };

    let value = whole.checked_mul(CENTS_PER_UNIT)?.checked_add(frac)?;
    Some(if negative { -value } else { value })
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Indonesian Rupiah formatting: `Rp239.000`, `Rp74.666,24`, `-Rp1.000`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.units().abs().to_string();

        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        if self.cents_part() == 0 {
            write!(f, "{}Rp{}", sign, grouped)
        } else {
            write!(f, "{}Rp{},{:02}", sign, grouped, self.cents_part())
        }
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed2(s)
            .map(Money::from_cents)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: format!("'{}' is not a decimal with at most two fraction digits", s),
            })
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
