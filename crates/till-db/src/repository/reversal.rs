//! # Reversal Engine
//!
//! Refund and void share one algorithm; they differ only in the target
//! status and the movement reason.
//!
//! ```text
//! BEGIN
//!   UPDATE sales SET status = target
//!    WHERE id = :id AND status = 'completed'
//!   RETURNING sale_number
//!     no row → SELECT status ── missing ──► NotFound
//!                           └── reversed ─► no-op (void may still set note)
//!   for each line:  gate +qty  ·  ledger (+qty, Refund|Void, sale_number)
//! COMMIT
//! ```
//!
//! The conditional UPDATE is the first statement, so the write lock is taken
//! before anything is read. Concurrent duplicate calls queue on that lock and
//! then see the sale as already reversed.
//!
//! Reversal always restores every line in full. Restorations go through the
//! gate like any other change but are positive, so they are never refused.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use till_core::{MovementReason, SaleStatus};
use tracing::{debug, info, warn};
use ts_rs::TS;

use super::sale::SaleRepository;
use super::{begin_failed, commit_failed, stock, to_millis};
use crate::error::{DbError, DbResult};

/// What a refund or void call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "outcome", content = "status", rename_all = "snake_case")]
pub enum ReversalOutcome {
    /// Status flipped and stock restored.
    Reversed,
    /// The sale was already refunded or voided; no stock moved.
    AlreadyReversed(SaleStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReversalKind {
    Refund,
    Void,
}

impl ReversalKind {
    fn target(self) -> SaleStatus {
        match self {
            ReversalKind::Refund => SaleStatus::Refunded,
            ReversalKind::Void => SaleStatus::Voided,
        }
    }

    fn reason(self) -> MovementReason {
        match self {
            ReversalKind::Refund => MovementReason::Refund,
            ReversalKind::Void => MovementReason::Void,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuantityRow {
    product_id: String,
    quantity: i64,
}

impl SaleRepository {
    /// Refunds a whole sale. Refunding a reversed sale changes nothing.
    pub async fn refund(&self, sale_id: &str) -> DbResult<ReversalOutcome> {
        self.reverse(sale_id, ReversalKind::Refund, None).await
    }

    /// Voids a whole sale, optionally recording why.
    ///
    /// Voiding a voided sale again only replaces its note, if one is given.
    pub async fn void(&self, sale_id: &str, note: Option<&str>) -> DbResult<ReversalOutcome> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        self.reverse(sale_id, ReversalKind::Void, note).await
    }

    async fn reverse(
        &self,
        sale_id: &str,
        kind: ReversalKind,
        note: Option<&str>,
    ) -> DbResult<ReversalOutcome> {
        let target = kind.target();
        let now = Utc::now();

        debug!(sale_id, target = target.as_str(), "Reversing sale");

        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        let reversed: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE sales
               SET status = ?2,
                   note = COALESCE(?3, note),
                   updated_at = ?4
             WHERE id = ?1 AND status = ?5
            RETURNING sale_number
            "#,
        )
        .bind(sale_id)
        .bind(target)
        .bind(note)
        .bind(to_millis(now))
        .bind(SaleStatus::Completed)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(sale_number) = reversed else {
            let status: SaleStatus = sqlx::query_scalar("SELECT status FROM sales WHERE id = ?1")
                .bind(sale_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

            if !status.is_reversed() {
                return Err(DbError::Internal(format!(
                    "sale {sale_id} is {status} but was not reversed"
                )));
            }

            if let (Some(note), SaleStatus::Voided, ReversalKind::Void) = (note, status, kind) {
                sqlx::query("UPDATE sales SET note = ?2, updated_at = ?3 WHERE id = ?1")
                    .bind(sale_id)
                    .bind(note)
                    .bind(to_millis(now))
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await.map_err(commit_failed)?;
            }

            warn!(
                sale_id,
                status = status.as_str(),
                requested = target.as_str(),
                "Sale already reversed, nothing to do"
            );
            return Ok(ReversalOutcome::AlreadyReversed(status));
        };

        let lines: Vec<QuantityRow> = sqlx::query_as(
            "SELECT product_id, quantity FROM sale_items WHERE sale_id = ?1 ORDER BY line_no",
        )
        .bind(sale_id)
        .fetch_all(&mut *tx)
        .await?;

        for line in &lines {
            stock::move_stock(
                &mut tx,
                &line.product_id,
                line.quantity,
                kind.reason(),
                Some(&sale_number),
                now,
            )
            .await?;
        }

        tx.commit().await.map_err(commit_failed)?;

        info!(
            sale_id,
            sale_number = %sale_number,
            status = target.as_str(),
            lines = lines.len(),
            "Sale reversed"
        );
        Ok(ReversalOutcome::Reversed)
    }
}
