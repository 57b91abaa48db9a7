//! # Seed Data Generator
//!
//! Populates a development database with a demo shopper and a catalog.
//!
//! ## Usage
//! ```bash
//! # Demo user + full catalog into ./storefront_dev.db
//! cargo run -p storefront-db --bin seed
//!
//! # Limit the catalog, pick the database
//! cargo run -p storefront-db --bin seed -- --count 20 --db ./data/storefront.db
//! ```
//!
//! ## Generated Data
//! - User `demo@storefront.local` (id printed on completion, use it as `X-User-Id`)
//! - One primary address in Yogyakarta
//! - Products: `{CATEGORY}-{NNN}` SKUs, prices Rp9.500 - Rp250.000, some discounted

use chrono::Utc;
use std::env;
use storefront_core::{Address, Money, Percent, Product, User, Weight};
use storefront_db::{Database, DbConfig};
use uuid::Uuid;

/// Catalog: (sku prefix, [(name, price in Rupiah, grams)])
const CATALOG: &[(&str, &[(&str, i64, i64)])] = &[
    (
        "KOPI",
        &[
            ("Kopi Gayo Arabika 250g", 95_000, 250),
            ("Kopi Toraja Kalosi 250g", 110_000, 250),
            ("Kopi Kintamani 200g", 85_000, 200),
            ("Kopi Luwak Liar 100g", 250_000, 100),
            ("Kopi Robusta Lampung 500g", 75_000, 500),
        ],
    ),
    (
        "TEH",
        &[
            ("Teh Melati Tubruk 100g", 18_000, 100),
            ("Teh Hijau Gunung Mas 50g", 32_500, 50),
            ("Teh Hitam Kayu Aro 100g", 27_000, 100),
            ("Teh Rosella Kering 50g", 22_000, 50),
        ],
    ),
    (
        "CAMILAN",
        &[
            ("Keripik Singkong Balado", 15_000, 200),
            ("Kerupuk Udang Sidoarjo", 29_000, 250),
            ("Bakpia Kacang Hijau isi 20", 45_000, 600),
            ("Rempeyek Kacang", 9_500, 150),
            ("Dodol Garut", 33_334, 400),
            ("Wingko Babat", 33_333, 400),
        ],
    ),
    (
        "BUMBU",
        &[
            ("Sambal Bawang Bu Rudy", 38_000, 300),
            ("Kecap Manis Cap Bango 600ml", 26_500, 650),
            ("Terasi Udang Bangka", 21_000, 150),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = usize::MAX;
    let mut db_path = String::from("./storefront_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(usize::MAX);
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
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Maximum number of products (default: all)");
                println!("  -d, --db <PATH>    Database file path (default: ./storefront_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Storefront Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut uow = db.begin().await?;

    let existing = uow.products().list(1).await?;
    if !existing.is_empty() {
        println!("⚠ Database already has products");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        first_name: "Demo".to_string(),
        last_name: "Pembeli".to_string(),
        email: "demo@storefront.local".to_string(),
        phone: "081234567890".to_string(),
        created_at: now,
    };
    uow.users().insert(&user).await?;

    let address = Address {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        name: "Rumah".to_string(),
        address1: "Jl. Malioboro No. 52".to_string(),
        address2: "Sosromenduran".to_string(),
        location_id: "501".to_string(),
        location_name: "Kota Yogyakarta".to_string(),
        post_code: "55271".to_string(),
        phone: user.phone.clone(),
        email: user.email.clone(),
        is_primary: true,
        created_at: now,
    };
    uow.users().insert_address(&address).await?;

    println!("✓ Demo user and address created");
    println!();
    println!("Generating products...");

    let mut generated = 0;
    'catalog: for (prefix, products) in CATALOG {
        for (idx, (name, price, grams)) in products.iter().enumerate() {
            if generated >= count {
                break 'catalog;
            }

            let product = generate_product(prefix, idx, name, *price, *grams);
            if let Err(e) = uow.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.sku, e);
                continue;
            }

            println!("  {:<14} {:<32} {:>12}", product.sku, product.name, product.price.to_string());
            generated += 1;
        }
    }

    uow.commit().await?;

    println!();
    println!("✓ Generated {} products", generated);
    println!("  X-User-Id: {}", user.id);
    println!("  Address:   {}", address.id);
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Builds one product; every third product carries a discount.
fn generate_product(prefix: &str, idx: usize, name: &str, price: i64, grams: i64) -> Product {
    let now = Utc::now();

    let (discount_percent, discount_amount) = match idx % 3 {
        1 => (Percent::from_bps(1000), Money::zero()),
        2 if price > 50_000 => (Percent::zero(), Money::from_units(5_000)),
        _ => (Percent::zero(), Money::zero()),
    };

    Product {
        id: Uuid::new_v4().to_string(),
        sku: format!("{}-{:03}", prefix, idx + 1),
        name: name.to_string(),
        price: Money::from_units(price),
        stock: 5 + ((idx as i64 * 7) % 40),
        weight: Weight::from_grams(grams),
        discount_percent,
        discount_amount,
        created_at: now,
        updated_at: now,
    }
}
