//! # Product Repository
//!
//! Catalog reads and the two stock movements.
//!
//! ## Stock Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read stock, check in Rust, write absolute value              │
//! │     SELECT stock ... ; UPDATE products SET stock = 2 WHERE id = ?       │
//! │                                                                         │
//! │  ✅ CORRECT: conditional delta inside the locked transaction            │
//! │     UPDATE products SET stock = stock - ?2                              │
//! │     WHERE id = ?1 AND stock >= ?2                                       │
//! │                                                                         │
//! │  0 rows affected ⇒ not enough stock, caller aborts the transaction.     │
//! │  CHECK (stock >= 0) backs this up at the schema level.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use storefront_core::Product;

const PRODUCT_COLUMNS: &str = "id, sku, name, price, stock, weight, discount_percent, \
     discount_amount, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug)]
pub struct ProductRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(product)
    }

    /// Loads every listed product, keyed by ID. Missing IDs are simply absent.
    pub async fn get_many(&mut self, ids: &[String]) -> DbResult<HashMap<String, Product>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM products WHERE id IN (", PRODUCT_COLUMNS));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&mut *self.conn)
            .await?;

        debug!(requested = ids.len(), found = products.len(), "Loaded products");

        Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    /// Lists products ordered by name.
    pub async fn list(&mut self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY name LIMIT ?1",
            PRODUCT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&mut self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price, stock, weight,
                discount_percent, discount_amount, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.weight)
        .bind(product.discount_percent)
        .bind(product.discount_amount)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Takes the write lock on a product row.
    ///
    /// Returns false when the product does not exist.
    pub async fn lock(&mut self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE products SET id = id WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Removes `qty` units if at least that many are in stock.
    ///
    /// ## Returns
    /// * `Ok(true)` - Stock decremented
    /// * `Ok(false)` - Not enough stock (or no such product); nothing changed
    pub async fn decrement_stock(&mut self, id: &str, qty: i64) -> DbResult<bool> {
        debug!(product_id = %id, qty = qty, "Decrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND stock >= ?2
            "#,
        )
        .bind(id)
        .bind(qty)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Returns `qty` units to stock.
    pub async fn increment_stock(&mut self, id: &str, qty: i64) -> DbResult<()> {
        debug!(product_id = %id, qty = qty, "Returning stock");

        let result = sqlx::query(
            "UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(qty)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Reads the current stock level.
    pub async fn stock_of(&mut self, id: &str) -> DbResult<i64> {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}
