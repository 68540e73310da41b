//! # till-core: Pure Business Logic for Till
//!
//! Everything in this crate is deterministic and free of I/O. The storage
//! layer (`till-db`) feeds it catalog rows and a clock reading, and gets back
//! priced, validated values that it persists inside a single transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Till Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 UI bridge / API layer (external)                │   │
//! │  │    CreateSale, GetSale, ListSales, RefundSale, VoidSale, ...    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   draft   │  │  filter   │  │   │
//! │  │   │  Product  │  │   Money   │  │ SaleDraft │  │SaleFilter │  │   │
//! │  │   │   Sale    │  │  TaxCalc  │  │ Validated │  │ normalize │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (Database Layer)                     │   │
//! │  │     stock gate, stock ledger, sale store, reversal engine       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, SaleLine, StockMovement)
//! - [`money`] - Integer money and round-half-up tax arithmetic
//! - [`draft`] - Sale drafts and their validation into priced snapshots
//! - [`catalog`] - Product creation and manual stock adjustment input
//! - [`filter`] - Sale history filter and its defaults
//! - [`validation`] - Field-level validators
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::{line_amounts, Money};
//! use till_core::types::TaxRate;
//!
//! // 2 × $5.00 at 5% tax
//! let line = line_amounts(Money::from_cents(500), 2, Money::zero(), TaxRate::from_bps(500)).unwrap();
//! assert_eq!(line.subtotal.cents(), 1000);
//! assert_eq!(line.tax.cents(), 50);
//! assert_eq!(line.total.cents(), 1050);
//! ```

pub mod catalog;
pub mod draft;
pub mod error;
pub mod filter;
pub mod money;
pub mod types;
pub mod validation;

pub use catalog::{AdjustmentInput, NewProduct};
pub use draft::{DraftLine, PricedLine, SaleDraft, ValidatedDraft};
pub use error::ValidationError;
pub use filter::{search_key, NormalizedFilter, SaleFilter};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Page size used when a listing asks for none, or for an unusable one.
pub const DEFAULT_LIST_LIMIT: i64 = 200;

/// Upper bound on a single sale listing page.
pub const MAX_LIST_LIMIT: i64 = 500;

/// How far back a sale listing reaches when no usable `from` is given.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Longest accepted sale number, SKU, or movement reference.
pub const MAX_REFERENCE_LEN: usize = 64;
