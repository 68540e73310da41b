//! # Money Module
//!
//! Integer money and the line/order arithmetic built on it.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (cents)                              │
//! │    Every stored amount is an i64 count of cents. The only division     │
//! │    in the system is tax, and it rounds exactly once per line.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Line Arithmetic
//! ```text
//! subtotal = unit_price × quantity
//! taxable  = subtotal − discount
//! tax      = round_half_up(taxable × bps / 10000)
//! total    = taxable + tax
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use ts_rs::TS;

use crate::types::{SaleLine, TaxRate};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed so that refunds and differences can be expressed, but every amount
/// persisted by the sale engine is non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies a unit price by a quantity. `None` on overflow.
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_sub(&self, other: Money) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Calculates tax on this amount, rounding half up.
    ///
    /// ## Implementation
    /// `(amount × bps + 5000) / 10000` in i128. The +5000 is half of the
    /// divisor, so a remainder of exactly one half rounds away from zero for
    /// the non-negative amounts the engine works with.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    /// use till_core::types::TaxRate;
    ///
    /// // $10.00 × 8.25% = $0.825 → $0.83
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    ///
    /// Negative amounts are rejected upstream by draft validation and are not
    /// given any particular rounding here.
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        if rate.is_zero() {
            return Money::zero();
        }
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Average of `total` over `count`, rounding half up. Zero when `count` is zero.
    pub fn average(total: Money, count: i64) -> Money {
        if count <= 0 {
            return Money::zero();
        }
        let avg = (total.0 as i128 * 2 + count as i128) / (count as i128 * 2);
        Money::from_cents(avg as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Line & Order Arithmetic
// =============================================================================

/// Derived amounts for one sale line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

/// Prices one line: subtotal, then tax on the discounted subtotal.
///
/// Callers guarantee `quantity > 0`, non-negative price and discount, and
/// `discount <= unit_price × quantity`. Returns `None` when any amount
/// leaves the i64 range.
pub fn line_amounts(
    unit_price: Money,
    quantity: i64,
    discount: Money,
    rate: TaxRate,
) -> Option<LineAmounts> {
    let subtotal = unit_price.checked_mul_quantity(quantity)?;
    let taxable = subtotal.checked_sub(discount)?;
    let tax = taxable.calculate_tax(rate);
    Some(LineAmounts {
        subtotal,
        discount,
        tax,
        total: taxable.checked_add(tax)?,
    })
}

/// Aggregate amounts of a sale, summed over its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl SaleTotals {
    /// Sums the stored line fields.
    pub fn from_lines(lines: &[SaleLine]) -> Self {
        lines.iter().fold(SaleTotals::default(), |acc, line| SaleTotals {
            subtotal_cents: acc.subtotal_cents + line.line_subtotal_cents,
            discount_cents: acc.discount_cents + line.line_discount_cents,
            tax_cents: acc.tax_cents + line.line_tax_cents,
            total_cents: acc.total_cents + line.line_total_cents,
        })
    }

    /// Adds one priced line. `None` on overflow.
    pub fn checked_add_line(&self, line: &LineAmounts) -> Option<Self> {
        Some(SaleTotals {
            subtotal_cents: self.subtotal_cents.checked_add(line.subtotal.cents())?,
            discount_cents: self.discount_cents.checked_add(line.discount.cents())?,
            tax_cents: self.tax_cents.checked_add(line.tax.cents())?,
            total_cents: self.total_cents.checked_add(line.total.cents())?,
        })
    }

    /// `total == subtotal − discount + tax`.
    pub fn is_consistent(&self) -> bool {
        self.total_cents == self.subtotal_cents - self.discount_cents + self.tax_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(subtotal: i64, discount: i64, tax: i64) -> SaleLine {
        SaleLine {
            product_id: "p".to_string(),
            product_name: "Item".to_string(),
            sku: "SKU".to_string(),
            quantity: 1,
            unit_price_cents: subtotal,
            tax_rate_bps: 0,
            line_subtotal_cents: subtotal,
            line_discount_cents: discount,
            line_tax_cents: tax,
            line_total_cents: subtotal - discount + tax,
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
    }

    #[test]
    fn test_tax_basic() {
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(500));
        assert_eq!(tax.cents(), 50);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 5000 × 1bp = 0.5 → 1
        assert_eq!(Money::from_cents(5000).calculate_tax(TaxRate::from_bps(1)).cents(), 1);
        // 25000 × 1bp = 2.5 → 3 (half-even would give 2)
        assert_eq!(Money::from_cents(25000).calculate_tax(TaxRate::from_bps(1)).cents(), 3);
        // 4999 × 1bp = 0.4999 → 0
        assert_eq!(Money::from_cents(4999).calculate_tax(TaxRate::from_bps(1)).cents(), 0);
    }

    #[test]
    fn test_zero_rate_yields_zero_tax() {
        let tax = Money::from_cents(123_456).calculate_tax(TaxRate::zero());
        assert!(tax.is_zero());
    }

    #[test]
    fn test_tax_does_not_overflow_on_large_amounts() {
        let amount = Money::from_cents(i64::MAX / 2);
        let tax = amount.calculate_tax(TaxRate::from_bps(10000));
        assert_eq!(tax.cents(), i64::MAX / 2);
    }

    #[test]
    fn test_line_amounts() {
        let amounts =
            line_amounts(Money::from_cents(500), 2, Money::zero(), TaxRate::from_bps(500)).unwrap();
        assert_eq!(amounts.subtotal.cents(), 1000);
        assert_eq!(amounts.tax.cents(), 50);
        assert_eq!(amounts.total.cents(), 1050);
    }

    #[test]
    fn test_line_amounts_tax_on_discounted_subtotal() {
        // 3 × 999 = 2997, less 297 = 2700, 8.25% = 222.75 → 223
        let amounts = line_amounts(
            Money::from_cents(999),
            3,
            Money::from_cents(297),
            TaxRate::from_bps(825),
        )
        .unwrap();
        assert_eq!(amounts.subtotal.cents(), 2997);
        assert_eq!(amounts.tax.cents(), 223);
        assert_eq!(amounts.total.cents(), 2700 + 223);
    }

    #[test]
    fn test_line_amounts_overflow() {
        // Full tax on the largest price doubles it past i64::MAX.
        let full_tax = line_amounts(Money::from_cents(i64::MAX), 1, Money::zero(), TaxRate::from_bps(10000));
        assert_eq!(full_tax, None);

        let too_many = line_amounts(Money::from_cents(i64::MAX / 2 + 1), 2, Money::zero(), TaxRate::zero());
        assert_eq!(too_many, None);
    }

    #[test]
    fn test_checked_add_line() {
        let half = Money::from_cents(i64::MAX / 2 + 1);
        let amounts = line_amounts(half, 1, Money::zero(), TaxRate::zero()).unwrap();

        let once = SaleTotals::default().checked_add_line(&amounts).unwrap();
        assert_eq!(once.total_cents, half.cents());
        assert_eq!(once.checked_add_line(&amounts), None);
    }

    #[test]
    fn test_totals_from_lines() {
        let totals = SaleTotals::from_lines(&[line(1000, 100, 45), line(250, 0, 13)]);
        assert_eq!(totals.subtotal_cents, 1250);
        assert_eq!(totals.discount_cents, 100);
        assert_eq!(totals.tax_cents, 58);
        assert_eq!(totals.total_cents, 1208);
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_average_rounds_half_up() {
        assert_eq!(Money::average(Money::from_cents(1001), 2).cents(), 501);
        assert_eq!(Money::average(Money::from_cents(1000), 3).cents(), 333);
        assert_eq!(Money::average(Money::from_cents(1000), 0).cents(), 0);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 5].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 355);
    }
}
