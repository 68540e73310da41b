//! # Domain Types
//!
//! Core domain types shared by the sale engine and its callers.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │ StockMovement   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (seq)       │       │
//! │  │  sku            │   │  sale_number    │   │  product_id     │       │
//! │  │  current_qty    │   │  status         │   │  delta (±)      │       │
//! │  │  price / tax    │   │  lines[]        │   │  reason, ref    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │   SaleStatus    │   │ MovementReason  │       │
//! │  │  bps (u32)      │   │  Completed      │   │  Sale           │       │
//! │  │  500 = 5%       │   │  Refunded       │   │  Refund / Void  │       │
//! │  └─────────────────┘   │  Voided         │   │  ManualAdjust.  │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A [`SaleLine`] copies price, tax rate, name and SKU from the product at
//! sale time. Later catalog edits never change a historical sale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::SaleTotals;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%; 500 bps = 5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product as seen by the sale engine.
///
/// `current_qty` only ever changes through the stock gate, and never drops
/// below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
    pub current_qty: i64,
    /// Low-stock threshold; zero disables the warning.
    pub reorder_level: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.reorder_level > 0 && self.current_qty <= self.reorder_level
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Lifecycle state of a committed sale.
///
/// ```text
/// Completed ──refund──► Refunded
///     │
///     └──────void─────► Voided
/// ```
/// Both transitions are one-way; a reversed sale never changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Refunded,
    Voided,
}

impl SaleStatus {
    /// Refunded or voided.
    pub fn is_reversed(&self) -> bool {
        matches!(self, SaleStatus::Refunded | SaleStatus::Voided)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Refunded => "refunded",
            SaleStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// Card payment on an external terminal.
    Card,
    BankTransfer,
    MobileWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::MobileWallet => "mobile_wallet",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Why a product's quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    Sale,
    Refund,
    Void,
    ManualAdjustment,
}

impl MovementReason {
    /// Whether `delta` has the sign this reason requires.
    ///
    /// Sales consume stock, reversals restore it, manual adjustments go
    /// either way. A zero delta is never a movement.
    pub fn accepts_delta(&self, delta: i64) -> bool {
        match self {
            MovementReason::Sale => delta < 0,
            MovementReason::Refund | MovementReason::Void => delta > 0,
            MovementReason::ManualAdjustment => delta != 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::Sale => "sale",
            MovementReason::Refund => "refund",
            MovementReason::Void => "void",
            MovementReason::ManualAdjustment => "manual_adjustment",
        }
    }
}

/// One immutable row of the stock ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    /// Ledger sequence number; increases with insertion order.
    pub id: i64,
    pub product_id: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    /// Signed change; negative is an outflow.
    pub delta: i64,
    pub reason: MovementReason,
    /// Correlation id, e.g. the sale number.
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

// =============================================================================
// Sale Line
// =============================================================================

/// A priced line of a committed sale. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: String,
    /// Product name at time of sale.
    pub product_name: String,
    /// SKU at time of sale.
    pub sku: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
    /// `unit_price_cents × quantity`.
    pub line_subtotal_cents: i64,
    pub line_discount_cents: i64,
    pub line_tax_cents: i64,
    /// `subtotal − discount + tax`.
    pub line_total_cents: i64,
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale: header plus its ordered lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    /// Human sale/ticket number, unique, supplied by the caller.
    pub sale_number: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub note: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Insertion order is line order.
    pub lines: Vec<SaleLine>,
}

impl Sale {
    pub fn totals(&self) -> SaleTotals {
        SaleTotals {
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
        }
    }

    /// Header totals are internally consistent and equal the line sums.
    pub fn is_balanced(&self) -> bool {
        let header = self.totals();
        header.is_consistent() && header == SaleTotals::from_lines(&self.lines)
    }
}
