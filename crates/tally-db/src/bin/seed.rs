//! # Seed Data Generator
//!
//! Populates the database with demo products for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p tally-db --bin seed
//!
//! # Generate custom amount, custom database
//! cargo run -p tally-db --bin seed -- --count 1000 --db ./data/tally.db
//!
//! # More output
//! RUST_LOG=debug cargo run -p tally-db --bin seed
//! ```
//!
//! Each product gets a unique SKU `{CATEGORY}-{ABBR}-{NNN}`, a price between
//! $1.99 and $12.99 and a starting stock of 0-50. Products seeded with zero
//! stock are useful for exercising the shortage path at the till.

use chrono::Utc;
use std::env;
use tally_core::Product;
use tally_db::{generate_product_id, Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Product categories for demo data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "COF",
        &[
            "Espresso",
            "Americano",
            "Cappuccino",
            "Latte",
            "Flat White",
            "Mocha",
            "Cold Brew",
            "Affogato",
        ],
    ),
    (
        "TEA",
        &[
            "Green Tea",
            "Jasmine Tea",
            "Earl Grey",
            "Chai Latte",
            "Matcha Latte",
            "Thai Tea",
        ],
    ),
    (
        "BAK",
        &[
            "Croissant",
            "Pain au Chocolat",
            "Banana Bread",
            "Blueberry Muffin",
            "Cinnamon Roll",
            "Bagel",
            "Brownie",
        ],
    ),
    (
        "RTL",
        &[
            "House Blend Beans",
            "Single Origin Beans",
            "Drip Bags",
            "Ceramic Mug",
            "Tumbler",
        ],
    ),
];

/// Size variants with their price add-on in cents
const SIZES: &[(&str, i64)] = &[("Regular", 0), ("Large", 150), ("Jumbo", 300)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 100 + name_idx * 10 + size_idx;
                let product = generate_product(category_code, name, size, *price_addon, seed);

                if let Err(e) = db.products().insert(&product).await {
                    warn!(sku = %product.sku, error = %e, "Failed to insert product");
                    continue;
                }

                generated += 1;
            }
        }
    }

    info!(
        generated,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

/// Generates a single product with plausible data.
fn generate_product(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> Product {
    let now = Utc::now();

    let abbr: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:03}", category, abbr, seed);

    // $1.99 - $9.99 + size addon
    let price_cents = 199 + ((seed * 37) % 800) as i64 + price_addon;

    // Every 7th product starts empty
    let stock = if seed % 7 == 0 { 0 } else { (seed % 51) as i64 };

    Product {
        id: generate_product_id(),
        sku,
        name: format!("{} {}", name, size),
        price_cents,
        stock,
        stock_version: 0,
        last_stock_update: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
