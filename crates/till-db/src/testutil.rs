//! Fixtures shared by the storage tests.

use std::path::PathBuf;
use till_core::{DraftLine, NewProduct, PaymentMethod, Product, SaleDraft};

use crate::{Database, DbConfig};

/// Fresh, migrated, private in-memory database.
pub async fn db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

/// A database file under the system temp dir, removed with its WAL files on drop.
pub struct ScratchFile {
    path: PathBuf,
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// Fresh, migrated database on disk with a multi-connection pool, for tests
/// that need real concurrent writers.
pub async fn file_db() -> (Database, ScratchFile) {
    let path = std::env::temp_dir().join(format!("till-test-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(path.clone()).max_connections(8))
        .await
        .expect("file database");
    (db, ScratchFile { path })
}

pub fn new_product(sku: &str, qty: i64, price_cents: i64, tax_bps: i64) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        unit_price_cents: price_cents,
        tax_rate_bps: tax_bps,
        opening_qty: qty,
        reorder_level: 0,
    }
}

/// Creates a product with `qty` opening stock.
pub async fn product(db: &Database, sku: &str, qty: i64, price_cents: i64, tax_bps: i64) -> Product {
    db.products()
        .create(new_product(sku, qty, price_cents, tax_bps))
        .await
        .expect("create product")
}

pub async fn qty(db: &Database, product_id: &str) -> i64 {
    db.products()
        .get_by_id(product_id)
        .await
        .expect("read product")
        .expect("product exists")
        .current_qty
}

pub fn line(product: &Product, quantity: i64) -> DraftLine {
    DraftLine::from_product(product, quantity, 0)
}

pub fn draft(sale_number: &str, lines: Vec<DraftLine>) -> SaleDraft {
    SaleDraft {
        sale_number: sale_number.to_string(),
        timestamp: None,
        customer_name: None,
        note: None,
        payment_method: Some(PaymentMethod::Cash),
        lines,
    }
}

/// Row counts of the sale tables and the ledger.
pub async fn row_counts(db: &Database) -> (i64, i64, i64) {
    let count = |table: &'static str| async move {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let n: i64 = sqlx::query_scalar(&sql)
            .fetch_one(db.pool())
            .await
            .expect("count rows");
        n
    };
    (
        count("sales").await,
        count("sale_items").await,
        count("stock_movements").await,
    )
}
