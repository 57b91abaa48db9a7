//! # Cart Repository
//!
//! One cart row per user plus its lines.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock_or_create(user)                                                   │
//! │       │                                                                 │
//! │       ├── UPDATE carts SET id = id WHERE user_id = ?   (takes the lock) │
//! │       │        1 row  → SELECT cart + items                             │
//! │       │        0 rows → INSERT empty cart                               │
//! │       ▼                                                                 │
//! │  Cart aggregate mutated in storefront-core                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  save(cart) → UPDATE totals, replace lines                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{Cart, CartItem, TaxRate};

const CART_COLUMNS: &str = "id, user_id, base_total, tax_percent, tax_amount, \
     discount_percent, discount_amount, grand_total, total_weight, total_items, \
     created_at, updated_at";

const ITEM_COLUMNS: &str = "id, cart_id, product_id, qty, unit_price, discount_per_unit, \
     final_unit_price, subtotal, created_at, updated_at";

#[derive(Debug)]
pub struct CartRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CartRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CartRepository { conn }
    }

    /// Locks the user's cart, creating an empty one first if none exists.
    pub async fn lock_or_create(
        &mut self,
        user_id: &str,
        tax: TaxRate,
        now: DateTime<Utc>,
    ) -> DbResult<Cart> {
        let locked = sqlx::query("UPDATE carts SET id = id WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *self.conn)
            .await?;

        if locked.rows_affected() == 0 {
            let cart = Cart::new(user_id, tax, now);
            debug!(user_id = %user_id, cart_id = %cart.id, "Creating cart");
            self.insert(&cart).await?;
            return Ok(cart);
        }

        let cart = self
            .fetch_by_user(user_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", user_id))?;
        Ok(cart)
    }

    /// Locks and loads a cart by ID. Ownership is the caller's check.
    pub async fn lock_by_id(&mut self, cart_id: &str) -> DbResult<Option<Cart>> {
        let locked = sqlx::query("UPDATE carts SET id = id WHERE id = ?1")
            .bind(cart_id)
            .execute(&mut *self.conn)
            .await?;

        if locked.rows_affected() == 0 {
            return Ok(None);
        }

        let cart = sqlx::query_as::<_, Cart>(&format!(
            "SELECT {} FROM carts WHERE id = ?1",
            CART_COLUMNS
        ))
        .bind(cart_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match cart {
            Some(mut cart) => {
                cart.items = self.items(&cart.id).await?;
                Ok(Some(cart))
            }
            None => Ok(None),
        }
    }

    /// Loads the user's cart without locking it.
    pub async fn fetch_by_user(&mut self, user_id: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(&format!(
            "SELECT {} FROM carts WHERE user_id = ?1",
            CART_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match cart {
            Some(mut cart) => {
                cart.items = self.items(&cart.id).await?;
                Ok(Some(cart))
            }
            None => Ok(None),
        }
    }

    async fn items(&mut self, cart_id: &str) -> DbResult<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>(&format!(
            "SELECT {} FROM cart_items WHERE cart_id = ?1 ORDER BY created_at, id",
            ITEM_COLUMNS
        ))
        .bind(cart_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(items)
    }

    async fn insert(&mut self, cart: &Cart) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (
                id, user_id, base_total, tax_percent, tax_amount,
                discount_percent, discount_amount, grand_total,
                total_weight, total_items, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.base_total)
        .bind(cart.tax_percent)
        .bind(cart.tax_amount)
        .bind(cart.discount_percent)
        .bind(cart.discount_amount)
        .bind(cart.grand_total)
        .bind(cart.total_weight)
        .bind(cart.total_items)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Writes the cart totals and replaces its lines.
    pub async fn save(&mut self, cart: &Cart) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE carts SET
                base_total = ?2,
                tax_percent = ?3,
                tax_amount = ?4,
                discount_percent = ?5,
                discount_amount = ?6,
                grand_total = ?7,
                total_weight = ?8,
                total_items = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&cart.id)
        .bind(cart.base_total)
        .bind(cart.tax_percent)
        .bind(cart.tax_amount)
        .bind(cart.discount_percent)
        .bind(cart.discount_amount)
        .bind(cart.grand_total)
        .bind(cart.total_weight)
        .bind(cart.total_items)
        .bind(cart.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart", &cart.id));
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
            .bind(&cart.id)
            .execute(&mut *self.conn)
            .await?;

        for item in &cart.items {
            sqlx::query(
                r#"
                INSERT INTO cart_items (
                    id, cart_id, product_id, qty, unit_price, discount_per_unit,
                    final_unit_price, subtotal, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&item.id)
            .bind(&cart.id)
            .bind(&item.product_id)
            .bind(item.qty)
            .bind(item.unit_price)
            .bind(item.discount_per_unit)
            .bind(item.final_unit_price)
            .bind(item.subtotal)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut *self.conn)
            .await?;
        }

        debug!(cart_id = %cart.id, lines = cart.items.len(), "Cart saved");
        Ok(())
    }

    /// Empties the user's cart and zeroes its totals.
    ///
    /// Returns the cart ID, or `None` when the user has no cart.
    pub async fn clear_for_user(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<String>> {
        let cart_id: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE carts SET
                base_total = 0,
                tax_amount = 0,
                discount_amount = 0,
                grand_total = 0,
                total_weight = 0,
                total_items = 0,
                updated_at = ?2
            WHERE user_id = ?1
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?;

        if let Some(id) = &cart_id {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
                .bind(id)
                .execute(&mut *self.conn)
                .await?;
        }

        Ok(cart_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::collections::HashMap;
    use storefront_core::{Money, Percent, Product, User, Weight, DEFAULT_TAX_RATE};

    async fn setup() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        uow.users()
            .insert(&User {
                id: "u1".to_string(),
                first_name: "Ani".to_string(),
                last_name: String::new(),
                email: "ani@example.com".to_string(),
                phone: String::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let product = Product {
            id: "p1".to_string(),
            sku: "TEH-1".to_string(),
            name: "Teh Melati".to_string(),
            price: Money::from_units(12_500),
            stock: 10,
            weight: Weight::from_grams(100),
            discount_percent: Percent::zero(),
            discount_amount: Money::zero(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        uow.products().insert(&product).await.unwrap();
        uow.commit().await.unwrap();
        (db, product)
    }

    #[tokio::test]
    async fn test_lock_or_create_is_stable() {
        let (db, _) = setup().await;
        let mut uow = db.begin().await.unwrap();

        let first = uow
            .carts()
            .lock_or_create("u1", DEFAULT_TAX_RATE, Utc::now())
            .await
            .unwrap();
        let second = uow
            .carts()
            .lock_or_create("u1", DEFAULT_TAX_RATE, Utc::now())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_clear() {
        let (db, product) = setup().await;
        let mut uow = db.begin().await.unwrap();

        let mut cart = uow
            .carts()
            .lock_or_create("u1", DEFAULT_TAX_RATE, Utc::now())
            .await
            .unwrap();
        cart.add_item(&product, 2, Utc::now()).unwrap();
        let catalog = HashMap::from([(product.id.clone(), product.clone())]);
        cart.refresh(&catalog, DEFAULT_TAX_RATE, Utc::now());
        uow.carts().save(&cart).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = db.begin().await.unwrap();
        let loaded = uow.carts().lock_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.total_items, 2);
        assert_eq!(loaded.base_total, Money::from_units(25_000));
        assert_eq!(loaded.grand_total, Money::from_units(28_000));

        let cleared = uow.carts().clear_for_user("u1", Utc::now()).await.unwrap();
        assert_eq!(cleared.as_deref(), Some(cart.id.as_str()));

        let empty = uow.carts().fetch_by_user("u1").await.unwrap().unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.grand_total, Money::zero());

        assert!(uow.carts().clear_for_user("nobody", Utc::now()).await.unwrap().is_none());
    }
}
