//! # Seed Data Generator
//!
//! Populates the database with demo products and opening stock.
//!
//! ## Usage
//! ```bash
//! # 200 products (default) into $TILL_DB_PATH or ./till.db
//! cargo run -p till-db --bin seed
//!
//! # Custom amount and file
//! cargo run -p till-db --bin seed -- --count 1000 --db ./data/till.db
//! ```
//!
//! Every product gets its opening stock through the ledger, so a seeded
//! database already satisfies `current_qty == Σ movements`.

use std::env;
use till_core::NewProduct;
use till_db::{Database, DbConfig, DbError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_COUNT: usize = 200;

/// Product families for realistic demo data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Mineral Water",
            "Sparkling Water",
            "Cola",
            "Lemon Soda",
            "Orange Juice",
            "Mango Juice",
            "Iced Tea",
            "Cold Coffee",
        ],
    ),
    (
        "SNK",
        &[
            "Salted Crisps",
            "Masala Crisps",
            "Salted Peanuts",
            "Chocolate Bar",
            "Butter Cookies",
            "Digestive Biscuits",
            "Popcorn",
            "Trail Mix",
        ],
    ),
    (
        "DRY",
        &[
            "Fresh Milk",
            "Yogurt",
            "Cheddar",
            "Butter",
            "Cream",
            "Eggs",
        ],
    ),
    (
        "GRO",
        &[
            "Basmati Rice",
            "Brown Bread",
            "Pasta",
            "Lentils",
            "Chickpeas",
            "Sugar",
            "Tea Leaves",
            "Cooking Oil",
        ],
    ),
];

/// Size variants and their price add-on in cents.
const SIZES: &[(&str, i64)] = &[("Small", 0), ("Regular", 60), ("Large", 150), ("Family", 320)];

/// Tax rates in basis points.
const TAX_RATES: &[i64] = &[0, 500, 825, 1000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config = DbConfig::from_env()?;
    let mut count = DEFAULT_COUNT;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if let Some(value) = args.get(i + 1) {
                    count = value.parse().map_err(|_| {
                        DbError::InvalidConfig(format!("--count expects a number, got '{value}'"))
                    })?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if let Some(value) = args.get(i + 1) {
                    config.database_path = value.into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: {DEFAULT_COUNT})");
                println!("  -d, --db <PATH>    Database file path (default: $TILL_DB_PATH or ./till.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(path = %config.database_path.display(), count, "Seeding database");

    let db = Database::new(config).await?;
    let products = db.products();

    let existing = products.count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let variants: Vec<(&str, &str, &str, i64)> = CATEGORIES
        .iter()
        .flat_map(|(category, names)| {
            names.iter().flat_map(move |name| {
                SIZES
                    .iter()
                    .map(move |(size, addon)| (*category, *name, *size, *addon))
            })
        })
        .collect();

    let start = std::time::Instant::now();
    let mut generated = 0;

    // Variants repeat once exhausted; the seed keeps SKUs unique.
    for seed in 0..count {
        let (category, name, size, price_addon) = variants[seed % variants.len()];
        let product = generate_product(category, name, size, price_addon, seed);
        match products.create(product).await {
            Ok(_) => generated += 1,
            Err(e) => warn!(error = %e, "Skipping product"),
        }
    }

    info!(
        generated,
        elapsed_ms = start.elapsed().as_millis() as u64,
        low_stock = products.count_low_stock().await?,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

/// Builds one demo product. `seed` makes SKU, price, tax and stock vary.
fn generate_product(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> NewProduct {
    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();

    NewProduct {
        sku: format!("{category}-{short}-{seed:04}"),
        name: format!("{name} {size}"),
        unit_price_cents: 99 + ((seed * 37) % 900) as i64 + price_addon,
        tax_rate_bps: TAX_RATES[seed % TAX_RATES.len()],
        opening_qty: (seed % 61) as i64,
        reorder_level: 5,
    }
}
