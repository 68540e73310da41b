//! # Stock Ledger
//!
//! Append-only record of every quantity change.
//!
//! Rows are inserted by [`record`] from inside the same transaction as the
//! stock gate call they explain, and are never updated or deleted. The
//! `id` sequence gives a total insertion order.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use till_core::{MovementReason, StockMovement};
use tracing::debug;

use super::{from_millis, to_millis};
use crate::error::DbResult;

/// Appends one movement and returns its sequence number.
pub async fn record(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
    reason: MovementReason,
    reference: Option<&str>,
    at: DateTime<Utc>,
) -> DbResult<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO stock_movements (product_id, ts_millis, delta, reason, ref)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(product_id)
    .bind(to_millis(at))
    .bind(delta)
    .bind(reason)
    .bind(reference)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    debug!(id, product_id, delta, reason = reason.as_str(), "Movement recorded");
    Ok(id)
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: i64,
    product_id: String,
    ts_millis: i64,
    delta: i64,
    reason: MovementReason,
    reference: Option<String>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = crate::error::DbError;

    fn try_from(row: MovementRow) -> DbResult<Self> {
        Ok(StockMovement {
            id: row.id,
            product_id: row.product_id,
            timestamp: from_millis(row.ts_millis)?,
            delta: row.delta,
            reason: row.reason,
            reference: row.reference,
        })
    }
}

fn into_movements(rows: Vec<MovementRow>) -> DbResult<Vec<StockMovement>> {
    rows.into_iter().map(StockMovement::try_from).collect()
}

/// Read access to the stock ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Most recent movements of one product, newest first.
    pub async fn movements_for_product(
        &self,
        product_id: &str,
        limit: i64,
    ) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT id, product_id, ts_millis, delta, reason, ref AS reference
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        into_movements(rows)
    }

    /// All movements carrying `reference` (e.g. a sale number), in insertion order.
    pub async fn movements_by_ref(&self, reference: &str) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT id, product_id, ts_millis, delta, reason, ref AS reference
            FROM stock_movements
            WHERE ref = ?1
            ORDER BY id
            "#,
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;

        into_movements(rows)
    }

    /// Sum of all deltas for a product. Equals its `current_qty`.
    pub async fn balance(&self, product_id: &str) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0) FROM stock_movements WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }
}
