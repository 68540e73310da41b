//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleRepository ─────────┬── create / get / list                       │
//! │  (sale, history,         └── refund / void (reversal)                  │
//! │   reversal)                        │                                    │
//! │                                    │ inside one transaction             │
//! │  ProductRepository ── adjust_stock │                                    │
//! │                            │       │                                    │
//! │                            ▼       ▼                                    │
//! │                 stock::move_stock(conn, product, delta, reason, ref)   │
//! │                            │                                            │
//! │                 ┌──────────┴──────────┐                                 │
//! │                 ▼                     ▼                                 │
//! │         stock::apply_delta     ledger::record                          │
//! │         (conditional UPDATE)   (append-only INSERT)                    │
//! │                                                                         │
//! │  LedgerRepository / ReportRepository ── read only                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog rows and manual adjustments
//! - [`SaleRepository`](sale::SaleRepository) - Sale store, reversals, listings
//! - [`LedgerRepository`](ledger::LedgerRepository) - Stock movement reads
//! - [`ReportRepository`](report::ReportRepository) - Daily summary, top products

pub mod history;
pub mod ledger;
pub mod product;
pub mod report;
pub mod reversal;
pub mod sale;
pub mod stock;

use chrono::{DateTime, Utc};

use crate::error::{DbError, DbResult};

/// Storage form of a timestamp: unix milliseconds, UTC.
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DbError::Internal(format!("timestamp out of range: {ms}")))
}

/// Drops sub-millisecond precision so a value reads back exactly as stored.
pub(crate) fn truncate_to_millis(ts: DateTime<Utc>) -> DbResult<DateTime<Utc>> {
    from_millis(to_millis(ts))
}

pub(crate) fn begin_failed(err: sqlx::Error) -> DbError {
    DbError::TransactionFailed(format!("begin: {err}"))
}

pub(crate) fn commit_failed(err: sqlx::Error) -> DbError {
    DbError::TransactionFailed(format!("commit: {err}"))
}
