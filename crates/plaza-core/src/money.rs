//! # Money Module
//!
//! Provides the `Money` and `Rate` types for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A commission ledger drifting by fractions of a cent per order is a    │
//! │  reconciliation nightmare at settlement time.                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + Basis Points                             │
//! │    $100.00 at 8.00%  →  10000 cents × 800 bps  →  800 cents exactly    │
//! │    Rounding happens ONCE, half-up, when the commission is computed     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use plaza_core::money::{Money, Rate};
//!
//! // Create from cents (never from floats)
//! let sale = Money::from_cents(10_000); // $100.00
//!
//! // Commission at 8.00% (800 basis points)
//! let commission = sale.apply_rate(Rate::from_bps(800));
//! assert_eq!(commission.cents(), 800); // $8.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for corrections/adjustments
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// EVERY monetary value in the settlement core flows through this type:
/// line subtotals, per-store sale amounts, commission amounts, settlement
/// totals. The database stores the raw cents; only operator output formats
/// to a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use plaza_core::money::Money;
    ///
    /// let amount = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(amount.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Applies a commission rate using half-up rounding to the cent.
    ///
    /// This is THE single place where commission amounts are rounded.
    /// Everything downstream (per-line breakdowns, order aggregates,
    /// settlement totals) sums already-rounded cents and never rounds again.
    ///
    /// ## Implementation
    /// Integer math in i128: `(cents * bps + 5000) / 10000`.
    /// The +5000 provides half-up rounding (5000/10000 = 0.5).
    /// Negative amounts round half-away-from-zero, symmetric with positive.
    ///
    /// ## Example
    /// ```rust
    /// use plaza_core::money::{Money, Rate};
    ///
    /// let sale = Money::from_cents(20_000); // $200.00
    /// let commission = sale.apply_rate(Rate::from_bps(500)); // 5.00%
    /// assert_eq!(commission.cents(), 1000); // $10.00
    ///
    /// // $10.01 at 8.25% = $0.825825 → rounds half-up to $0.83
    /// let odd = Money::from_cents(1001).apply_rate(Rate::from_bps(825));
    /// assert_eq!(odd.cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        // i128 to prevent overflow on large amounts
        let raw = self.0 as i128 * rate.bps() as i128;
        let rounded = if raw >= 0 {
            (raw + 5000) / 10000
        } else {
            (raw - 5000) / 10000
        };
        Money::from_cents(rounded as i64)
    }

    /// Checked addition, for accumulating order-level totals.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and operator reports. API consumers receive raw cents.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.units().abs(), self.cents_part())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// A commission rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 800 bps = 8.00% (a typical marketplace commission)
///
/// Plans store their percentage in basis points so that fractional rates
/// like 8.25% stay exact integers end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

/// Display as a percentage with two decimals, e.g. "8.00%".
impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
