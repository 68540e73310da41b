//! # Sale Repository
//!
//! Persists a sale header and its lines as one unit.
//!
//! ## Create Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleDraft ──validate()──► ValidatedDraft     (no storage touched)     │
//! │                                 │                                       │
//! │  BEGIN ─────────────────────────┼───────────────────────────────────┐   │
//! │  │  INSERT sales (totals)       ▼                                   │   │
//! │  │  for each line, in draft order:                                  │   │
//! │  │    read product             ── missing ──► NotFound              │   │
//! │  │    INSERT sale_items (snapshot)                                  │   │
//! │  │    gate: qty − n            ── short ────► InsufficientStock     │   │
//! │  │    ledger: (−n, Sale, sale_number)                               │   │
//! │  COMMIT ◄───────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Any error drops the transaction: no header, lines or movements.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Refund and void live in [`reversal`](super::reversal), listings in
//! [`history`](super::history).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use till_core::{search_key, MovementReason, PaymentMethod, Sale, SaleDraft, SaleLine, SaleStatus};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::product::fetch_product;
use super::{begin_failed, commit_failed, from_millis, stock, to_millis, truncate_to_millis};
use crate::error::{DbError, DbResult};

pub(crate) const SALE_COLUMNS: &str = "id, sale_number, ts_millis, customer_name, note, \
                                       payment_method, status, subtotal_cents, discount_cents, \
                                       tax_cents, total_cents";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SaleRow {
    pub id: String,
    sale_number: String,
    ts_millis: i64,
    customer_name: Option<String>,
    note: Option<String>,
    payment_method: PaymentMethod,
    status: SaleStatus,
    subtotal_cents: i64,
    discount_cents: i64,
    tax_cents: i64,
    total_cents: i64,
}

impl SaleRow {
    pub(crate) fn into_sale(self, lines: Vec<SaleLine>) -> DbResult<Sale> {
        Ok(Sale {
            id: self.id,
            sale_number: self.sale_number,
            timestamp: from_millis(self.ts_millis)?,
            customer_name: self.customer_name,
            note: self.note,
            payment_method: self.payment_method,
            status: self.status,
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            lines,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    sale_id: String,
    product_id: String,
    product_name: String,
    sku: String,
    quantity: i64,
    unit_price_cents: i64,
    tax_rate_bps: i64,
    line_subtotal_cents: i64,
    line_discount_cents: i64,
    line_tax_cents: i64,
    line_total_cents: i64,
}

impl TryFrom<LineRow> for SaleLine {
    type Error = DbError;

    fn try_from(row: LineRow) -> DbResult<Self> {
        let tax_rate_bps = u32::try_from(row.tax_rate_bps)
            .map_err(|_| DbError::Internal(format!("bad tax rate on sale {}", row.sale_id)))?;

        Ok(SaleLine {
            product_id: row.product_id,
            product_name: row.product_name,
            sku: row.sku,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            tax_rate_bps,
            line_subtotal_cents: row.line_subtotal_cents,
            line_discount_cents: row.line_discount_cents,
            line_tax_cents: row.line_tax_cents,
            line_total_cents: row.line_total_cents,
        })
    }
}

/// Loads the lines of several sales in one query, keyed by sale id, each
/// list in line order.
pub(crate) async fn load_lines(
    conn: &mut SqliteConnection,
    sale_ids: &[String],
) -> DbResult<HashMap<String, Vec<SaleLine>>> {
    let mut by_sale: HashMap<String, Vec<SaleLine>> = HashMap::new();
    if sale_ids.is_empty() {
        return Ok(by_sale);
    }

    let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
        "SELECT sale_id, product_id, product_name, sku, quantity, unit_price_cents, \
         tax_rate_bps, line_subtotal_cents, line_discount_cents, line_tax_cents, \
         line_total_cents FROM sale_items WHERE sale_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in sale_ids {
        ids.push_bind(id);
    }
    ids.push_unseparated(") ORDER BY sale_id, line_no");

    let rows: Vec<LineRow> = qb.build_query_as().fetch_all(&mut *conn).await?;

    for row in rows {
        let sale_id = row.sale_id.clone();
        by_sale.entry(sale_id).or_default().push(SaleLine::try_from(row)?);
    }

    Ok(by_sale)
}

async fn fetch_sale_where(
    conn: &mut SqliteConnection,
    column: &str,
    value: &str,
) -> DbResult<Option<Sale>> {
    let row: Option<SaleRow> =
        sqlx::query_as(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE {column} = ?1"))
            .bind(value)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut lines = load_lines(conn, std::slice::from_ref(&row.id)).await?;
    let lines = lines.remove(&row.id).unwrap_or_default();
    row.into_sale(lines).map(Some)
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pub(crate) pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a sale: header, lines, stock decrements and movements, all
    /// or nothing.
    ///
    /// ## Errors
    /// - `Validation` - the draft breaks a rule; nothing was touched
    /// - `NotFound` - a line names an unknown product
    /// - `InsufficientStock` - a line asks for more than is on hand
    /// - `UniqueViolation` - the sale number is already used
    /// - `TransactionFailed` / other storage errors
    pub async fn create(&self, draft: SaleDraft) -> DbResult<Sale> {
        let validated = draft.validate()?;

        let id = Uuid::new_v4().to_string();
        let timestamp = truncate_to_millis(validated.timestamp().unwrap_or_else(Utc::now))?;
        let sale_number = validated.sale_number().to_string();
        let totals = validated.totals();

        debug!(
            id = %id,
            sale_number = %sale_number,
            lines = validated.lines().len(),
            total_cents = totals.total_cents,
            "Creating sale"
        );

        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, ts_millis, customer_name, note,
                payment_method, status,
                subtotal_cents, discount_cents, tax_cents, total_cents,
                updated_at, customer_search, sale_number_search
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&id)
        .bind(&sale_number)
        .bind(to_millis(timestamp))
        .bind(validated.customer_name())
        .bind(validated.note())
        .bind(validated.payment_method())
        .bind(SaleStatus::Completed)
        .bind(totals.subtotal_cents)
        .bind(totals.discount_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(to_millis(Utc::now()))
        .bind(search_key(validated.customer_name().unwrap_or_default()))
        .bind(search_key(&sale_number))
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("saleNumber", &sale_number))?;

        let mut lines = Vec::with_capacity(validated.lines().len());

        for (line_no, priced) in validated.lines().iter().enumerate() {
            let product = fetch_product(&mut tx, priced.product_id())
                .await?
                .ok_or_else(|| DbError::not_found("Product", priced.product_id()))?;

            let line = priced.to_sale_line(&product);

            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    sale_id, line_no, product_id, product_name, sku,
                    quantity, unit_price_cents, tax_rate_bps,
                    line_subtotal_cents, line_discount_cents, line_tax_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&id)
            .bind(line_no as i64)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(&line.sku)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.tax_rate_bps as i64)
            .bind(line.line_subtotal_cents)
            .bind(line.line_discount_cents)
            .bind(line.line_tax_cents)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await?;

            stock::move_stock(
                &mut tx,
                &line.product_id,
                -line.quantity,
                MovementReason::Sale,
                Some(&sale_number),
                timestamp,
            )
            .await
            .inspect_err(|e| {
                if matches!(e, DbError::InsufficientStock { .. }) {
                    warn!(sale_number = %sale_number, line_no, "Sale refused, rolling back");
                }
            })?;

            lines.push(line);
        }

        tx.commit().await.map_err(commit_failed)?;

        info!(
            id = %id,
            sale_number = %sale_number,
            total_cents = totals.total_cents,
            "Sale committed"
        );

        Ok(validated.into_sale(id, timestamp, lines))
    }

    /// Gets a sale with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;
        let sale = fetch_sale_where(&mut tx, "id", id).await?;
        tx.commit().await.map_err(commit_failed)?;

        sale.ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Gets a sale by its human sale number.
    pub async fn get_by_number(&self, sale_number: &str) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;
        let sale = fetch_sale_where(&mut tx, "sale_number", sale_number.trim()).await?;
        tx.commit().await.map_err(commit_failed)?;

        sale.ok_or_else(|| DbError::not_found("Sale", sale_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use chrono::{DateTime, Duration};
    use till_core::DraftLine;

    #[tokio::test]
    async fn test_sell_two_at_five_percent() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-A", 10, 500, 500).await;

        let sale = db
            .sales()
            .create(testutil::draft("INV-0001", vec![testutil::line(&product, 2)]))
            .await
            .unwrap();

        let line = &sale.lines[0];
        assert_eq!(line.line_subtotal_cents, 1000);
        assert_eq!(line.line_tax_cents, 50);
        assert_eq!(line.line_total_cents, 1050);
        assert_eq!(sale.total_cents, 1050);
        assert_eq!(sale.status, SaleStatus::Completed);
        assert!(sale.is_balanced());

        assert_eq!(testutil::qty(&db, &product.id).await, 8);
        let movements = db.ledger().movements_by_ref("INV-0001").await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].delta, -2);
        assert_eq!(movements[0].reason, MovementReason::Sale);
    }

    #[tokio::test]
    async fn test_oversell_changes_nothing() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-A", 10, 500, 500).await;
        db.sales()
            .create(testutil::draft("INV-0001", vec![testutil::line(&product, 2)]))
            .await
            .unwrap();
        let before = testutil::row_counts(&db).await;

        let err = db
            .sales()
            .create(testutil::draft("INV-0002", vec![testutil::line(&product, 20)]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::InsufficientStock {
                available: 8,
                requested: 20,
                ..
            }
        ));
        assert_eq!(testutil::qty(&db, &product.id).await, 8);
        assert_eq!(testutil::row_counts(&db).await, before);
    }

    #[tokio::test]
    async fn test_one_short_line_rolls_back_whole_sale() {
        let db = testutil::db().await;
        let a = testutil::product(&db, "SKU-A", 5, 100, 0).await;
        let b = testutil::product(&db, "SKU-B", 5, 200, 0).await;
        let c = testutil::product(&db, "SKU-C", 1, 300, 0).await;
        let before = testutil::row_counts(&db).await;

        let err = db
            .sales()
            .create(testutil::draft(
                "INV-0003",
                vec![
                    testutil::line(&a, 2),
                    testutil::line(&b, 3),
                    testutil::line(&c, 2),
                ],
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::InsufficientStock { .. }));
        assert_eq!(testutil::row_counts(&db).await, before);
        assert_eq!(testutil::qty(&db, &a.id).await, 5);
        assert_eq!(testutil::qty(&db, &b.id).await, 5);
        assert_eq!(testutil::qty(&db, &c.id).await, 1);
        assert!(matches!(
            db.sales().get_by_number("INV-0003").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let db = testutil::db().await;
        let a = testutil::product(&db, "SKU-A", 10, 999, 825).await;
        let b = testutil::product(&db, "SKU-B", 10, 250, 0).await;

        let mut draft = testutil::draft(
            "INV-0004",
            vec![DraftLine::from_product(&a, 3, 297), testutil::line(&b, 1)],
        );
        draft.customer_name = Some("Ayesha Khan".to_string());
        draft.note = Some("gift wrap".to_string());
        draft.payment_method = Some(PaymentMethod::Card);

        let created = db.sales().create(draft).await.unwrap();
        let fetched = db.sales().get(&created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.lines[0].sku, "SKU-A");
        assert_eq!(fetched.lines[1].sku, "SKU-B");
        assert_eq!(fetched.discount_cents, 297);
        assert!(fetched.is_balanced());

        let by_number = db.sales().get_by_number("INV-0004").await.unwrap();
        assert_eq!(by_number.id, created.id);
    }

    #[tokio::test]
    async fn test_snapshot_survives_catalog_changes() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-A", 10, 500, 500).await;

        let mut line = testutil::line(&product, 1);
        line.product_name = None;
        line.sku = None;
        let sale = db
            .sales()
            .create(testutil::draft("INV-0005", vec![line]))
            .await
            .unwrap();
        assert_eq!(sale.lines[0].product_name, product.name);

        db.products().delete(&product.id).await.unwrap();

        let fetched = db.sales().get(&sale.id).await.unwrap();
        assert_eq!(fetched.lines[0].product_name, product.name);
        assert_eq!(fetched.lines[0].sku, "SKU-A");
        assert_eq!(fetched.lines[0].unit_price_cents, 500);
    }

    #[tokio::test]
    async fn test_backdated_timestamp_is_kept() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-A", 10, 500, 0).await;
        let when = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();

        let mut draft = testutil::draft("INV-0006", vec![testutil::line(&product, 1)]);
        draft.timestamp = Some(when + Duration::nanoseconds(456));
        let sale = db.sales().create(draft).await.unwrap();

        assert_eq!(sale.timestamp, when);
        assert_eq!(db.sales().get(&sale.id).await.unwrap().timestamp, when);
    }

    #[tokio::test]
    async fn test_duplicate_sale_number() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-A", 10, 500, 0).await;
        db.sales()
            .create(testutil::draft("INV-0007", vec![testutil::line(&product, 1)]))
            .await
            .unwrap();

        let err = db
            .sales()
            .create(testutil::draft("INV-0007", vec![testutil::line(&product, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "saleNumber"));
        assert_eq!(err.code(), crate::error::ErrorCode::DuplicateKey);
        assert_eq!(testutil::qty(&db, &product.id).await, 9);
    }

    #[tokio::test]
    async fn test_unknown_product_and_invalid_draft() {
        let db = testutil::db().await;
        let product = testutil::product(&db, "SKU-A", 10, 500, 0).await;
        let before = testutil::row_counts(&db).await;

        let mut ghost = testutil::line(&product, 1);
        ghost.product_id = "no-such-product".to_string();
        let err = db
            .sales()
            .create(testutil::draft("INV-0008", vec![testutil::line(&product, 1), ghost]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = db
            .sales()
            .create(testutil::draft("INV-0009", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        assert_eq!(testutil::row_counts(&db).await, before);
        assert_eq!(testutil::qty(&db, &product.id).await, 10);
    }

    #[tokio::test]
    async fn test_get_unknown_sale() {
        let db = testutil::db().await;
        assert!(matches!(
            db.sales().get("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
