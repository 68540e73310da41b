//! # Product Repository
//!
//! Catalog rows as far as the sale engine needs them, and manual stock
//! adjustments.
//!
//! ## Stock Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   products.current_qty  ==  Σ stock_movements.delta (same product)     │
//! │                                                                         │
//! │   create(opening_qty = 12)                                              │
//! │     ├── INSERT products (current_qty = 0)                               │
//! │     └── move_stock(+12, ManualAdjustment, "opening")   ← same tx        │
//! │                                                                         │
//! │   adjust_stock(delta = -3)                                              │
//! │     └── move_stock(-3, ManualAdjustment, ref)          ← own tx         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting a product leaves its movements and sale lines in place; they keep
//! the product id for audit.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use till_core::{AdjustmentInput, MovementReason, NewProduct, Product};
use tracing::{debug, info};
use uuid::Uuid;

use super::{begin_failed, commit_failed, from_millis, stock, to_millis, truncate_to_millis};
use crate::error::{DbError, DbResult};

/// Ledger reference written with a product's opening stock.
pub const OPENING_STOCK_REF: &str = "opening";

const PRODUCT_COLUMNS: &str = "id, sku, name, unit_price_cents, tax_rate_bps, current_qty, \
                               reorder_level, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: String,
    sku: String,
    name: String,
    unit_price_cents: i64,
    tax_rate_bps: i64,
    current_qty: i64,
    reorder_level: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        let tax_rate_bps = u32::try_from(row.tax_rate_bps)
            .map_err(|_| DbError::Internal(format!("bad tax rate on product {}", row.id)))?;

        Ok(Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            unit_price_cents: row.unit_price_cents,
            tax_rate_bps,
            current_qty: row.current_qty,
            reorder_level: row.reorder_level,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

/// Reads one product on an existing connection, e.g. inside a transaction.
pub(crate) async fn fetch_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Option<Product>> {
    let row: Option<ProductRow> =
        sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"))
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    row.map(Product::try_from).transpose()
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.create(new_product).await?;
/// let product = repo.adjust_stock(adjustment).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Adds a product, recording any opening stock in the ledger.
    ///
    /// ## Errors
    /// - `Validation` for bad input
    /// - `UniqueViolation` when the SKU is taken
    pub async fn create(&self, input: NewProduct) -> DbResult<Product> {
        let input = input.validate()?;
        let id = Uuid::new_v4().to_string();
        let now = truncate_to_millis(Utc::now())?;

        debug!(id = %id, sku = %input.sku, "Creating product");

        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, unit_price_cents, tax_rate_bps,
                current_qty, reorder_level, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(input.unit_price_cents)
        .bind(input.tax_rate_bps)
        .bind(input.reorder_level)
        .bind(to_millis(now))
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("sku", &input.sku))?;

        if input.opening_qty > 0 {
            stock::move_stock(
                &mut tx,
                &id,
                input.opening_qty,
                MovementReason::ManualAdjustment,
                Some(OPENING_STOCK_REF),
                now,
            )
            .await?;
        }

        let product = fetch_product(&mut tx, &id)
            .await?
            .ok_or_else(|| DbError::Internal(format!("product {id} vanished during create")))?;

        tx.commit().await.map_err(commit_failed)?;

        info!(id = %product.id, sku = %product.sku, qty = product.current_qty, "Product created");
        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"))
                .bind(sku.trim())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Product::try_from).transpose()
    }

    /// All products, by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, sku"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Products at or below a non-zero reorder level.
    pub async fn count_low_stock(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE reorder_level > 0 AND current_qty <= reorder_level",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Removes a product from the catalog.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id, "Product deleted");
        Ok(())
    }

    /// Manual stock change: gate and ledger in one transaction.
    ///
    /// ## Errors
    /// - `Validation` for a zero delta, a reason other than manual
    ///   adjustment, or an overlong ref
    /// - `InsufficientStock` when a decrease would go below zero
    /// - `NotFound` for an unknown product
    pub async fn adjust_stock(&self, input: AdjustmentInput) -> DbResult<Product> {
        let input = input.validate()?;
        let now = Utc::now();

        debug!(product_id = %input.product_id, delta = input.delta, "Adjusting stock");

        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        stock::move_stock(
            &mut tx,
            &input.product_id,
            input.delta,
            input.reason,
            input.reference.as_deref(),
            now,
        )
        .await?;

        let product = fetch_product(&mut tx, &input.product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &input.product_id))?;

        tx.commit().await.map_err(commit_failed)?;

        info!(
            product_id = %product.id,
            delta = input.delta,
            qty = product.current_qty,
            "Stock adjusted"
        );
        Ok(product)
    }
}
