//! # Report Repository
//!
//! Read-only aggregates over committed sales. Refunded and voided sales are
//! excluded; only `completed` counts as revenue.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use till_core::{Money, SaleStatus};
use tracing::debug;
use ts_rs::TS;

use super::to_millis;
use crate::error::DbResult;

const DEFAULT_TOP_PRODUCTS: i64 = 10;
const MAX_TOP_PRODUCTS: i64 = 100;

/// Takings for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub sale_count: i64,
    pub total_cents: i64,
    pub tax_cents: i64,
    /// Rounded half up; zero on a day without sales.
    pub average_ticket_cents: i64,
}

/// One row of the best-sellers report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, sqlx::FromRow)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: String,
    /// Name as on the most recent sale line.
    pub product_name: String,
    pub sku: String,
    pub quantity_sold: i64,
    /// Sum of line totals, tax included.
    pub revenue_cents: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct DayRow {
    sale_count: i64,
    total_cents: i64,
    tax_cents: i64,
}

/// Repository for reporting queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    pub async fn daily_summary(&self, date: NaiveDate) -> DbResult<DailySummary> {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1);

        debug!(%date, "Building daily summary");

        let row: DayRow = sqlx::query_as(
            r#"
            SELECT COUNT(*)                    AS sale_count,
                   COALESCE(SUM(total_cents), 0) AS total_cents,
                   COALESCE(SUM(tax_cents), 0)   AS tax_cents
            FROM sales
            WHERE status = ?1 AND ts_millis >= ?2 AND ts_millis < ?3
            "#,
        )
        .bind(SaleStatus::Completed)
        .bind(to_millis(start))
        .bind(to_millis(end))
        .fetch_one(&self.pool)
        .await?;

        Ok(DailySummary {
            date,
            sale_count: row.sale_count,
            total_cents: row.total_cents,
            tax_cents: row.tax_cents,
            average_ticket_cents: Money::average(Money::from_cents(row.total_cents), row.sale_count)
                .cents(),
        })
    }

    /// Best sellers by revenue between `from` (inclusive) and `to` (exclusive).
    ///
    /// `limit` outside 1..=100 falls back to 10.
    pub async fn top_products(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<ProductSales>> {
        let limit = if (1..=MAX_TOP_PRODUCTS).contains(&limit) {
            limit
        } else {
            DEFAULT_TOP_PRODUCTS
        };

        // SQLite takes bare columns from the row that holds MAX(), which
        // gives the latest name and SKU snapshot per product.
        let rows: Vec<ProductSales> = sqlx::query_as(
            r#"
            SELECT si.product_id              AS product_id,
                   si.product_name            AS product_name,
                   si.sku                     AS sku,
                   MAX(s.ts_millis)           AS last_sold,
                   SUM(si.quantity)           AS quantity_sold,
                   SUM(si.line_total_cents)   AS revenue_cents
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            WHERE s.status = ?1 AND s.ts_millis >= ?2 AND s.ts_millis < ?3
            GROUP BY si.product_id
            ORDER BY revenue_cents DESC, quantity_sold DESC, si.product_id
            LIMIT ?4
            "#,
        )
        .bind(SaleStatus::Completed)
        .bind(to_millis(from))
        .bind(to_millis(to))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
