//! # Product Stock Gate
//!
//! The only code path that writes `products.current_qty`.
//!
//! ## Conditional Update
//! ```text
//! UPDATE products
//!    SET current_qty = current_qty + :delta
//!  WHERE id = :id
//!    AND current_qty + :delta >= 0      ← check and write in one statement
//! RETURNING current_qty
//!
//!   row returned  → applied
//!   no row        → product missing (NotFound)
//!                   or would go negative (InsufficientStock, nothing applied)
//! ```
//!
//! Positive deltas always satisfy the condition, so restorations are never
//! refused short of the i64 ceiling. Both functions take a connection borrowed from an open
//! transaction; the caller owns commit and rollback.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use till_core::{MovementReason, ValidationError};
use tracing::{debug, warn};

use super::{ledger, to_millis};
use crate::error::{DbError, DbResult};

/// Applies `delta` to a product's quantity and returns the new quantity.
pub async fn apply_delta(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    if delta == 0 {
        return Err(ValidationError::InvalidFormat {
            field: "delta".to_string(),
            reason: "must not be zero".to_string(),
        }
        .into());
    }

    // Highest quantity the delta can be added to without leaving i64.
    let ceiling = i64::MAX - delta.max(0);

    let updated: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
           SET current_qty = current_qty + ?2,
               updated_at = ?3
         WHERE id = ?1
           AND current_qty + ?2 >= 0
           AND current_qty <= ?4
        RETURNING current_qty
        "#,
    )
    .bind(product_id)
    .bind(delta)
    .bind(to_millis(now))
    .bind(ceiling)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(qty) = updated {
        debug!(product_id, delta, qty, "Stock updated");
        return Ok(qty);
    }

    let available: Option<i64> = sqlx::query_scalar("SELECT current_qty FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    match available {
        Some(available) if delta < 0 => {
            let requested = delta.saturating_neg();
            warn!(product_id, available, requested, "Insufficient stock");
            Err(DbError::InsufficientStock {
                product_id: product_id.to_string(),
                available,
                requested,
            })
        }
        Some(available) => Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -available,
            max: i64::MAX - available,
        }
        .into()),
        None => Err(DbError::not_found("Product", product_id)),
    }
}

/// Gate plus ledger: changes the quantity and appends the matching movement.
///
/// The movement is only written once the gate has accepted the change.
pub async fn move_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: i64,
    reason: MovementReason,
    reference: Option<&str>,
    at: DateTime<Utc>,
) -> DbResult<i64> {
    if !reason.accepts_delta(delta) {
        return Err(ValidationError::InvalidFormat {
            field: "delta".to_string(),
            reason: format!("sign not allowed for {}", reason.as_str()),
        }
        .into());
    }

    let qty = apply_delta(conn, product_id, delta, at).await?;
    ledger::record(conn, product_id, delta, reason, reference, at).await?;
    Ok(qty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn test_decrement_within_stock() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-1", 10, 500, 500).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let qty = apply_delta(&mut conn, &product.id, -4, Utc::now()).await.unwrap();
        assert_eq!(qty, 6);

        let qty = apply_delta(&mut conn, &product.id, -6, Utc::now()).await.unwrap();
        assert_eq!(qty, 0);
    }

    #[tokio::test]
    async fn test_refuses_overdraw_and_applies_nothing() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-1", 3, 500, 0).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let err = apply_delta(&mut conn, &product.id, -4, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            }
        ));
        drop(conn);

        assert_eq!(testutil::qty(&db, &product.id).await, 3);
    }

    #[tokio::test]
    async fn test_increment_is_unconditional() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-1", 0, 500, 0).await;

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(apply_delta(&mut conn, &product.id, 7, Utc::now()).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_extreme_deltas_are_refused_without_change() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-1", 5, 500, 0).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let err = apply_delta(&mut conn, &product.id, i64::MIN, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::InsufficientStock {
                available: 5,
                requested: i64::MAX,
                ..
            }
        ));

        let err = apply_delta(&mut conn, &product.id, i64::MAX, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        drop(conn);

        assert_eq!(testutil::qty(&db, &product.id).await, 5);
    }

    #[tokio::test]
    async fn test_unknown_product_and_zero_delta() {
        let db = testutil::db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = apply_delta(&mut conn, "missing", -1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = apply_delta(&mut conn, "missing", 0, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_move_stock_writes_one_movement() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-1", 5, 500, 0).await;

        let mut conn = db.pool().acquire().await.unwrap();
        move_stock(&mut conn, &product.id, -2, MovementReason::Sale, Some("INV-1"), Utc::now())
            .await
            .unwrap();

        let err = move_stock(&mut conn, &product.id, 2, MovementReason::Sale, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let err = move_stock(&mut conn, &product.id, -9, MovementReason::Sale, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { .. }));
        drop(conn);

        let movements = db.ledger().movements_by_ref("INV-1").await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].delta, -2);
        // Opening movement plus the sale.
        assert_eq!(db.ledger().balance(&product.id).await.unwrap(), 3);
        assert_eq!(testutil::qty(&db, &product.id).await, 3);
    }
}
