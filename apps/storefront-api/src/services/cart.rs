//! # Cart Service
//!
//! One cart per user, mutated only inside a transaction that holds the cart
//! row lock. Every operation re-projects the lines onto the current catalog
//! before saving, so the stored totals always match the products.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  begin ─► lock_or_create(cart) ─► load catalog ─► mutate ─► refresh     │
//! │                                                                │        │
//! │                                                   save ◄───────┘        │
//! │                                                     │                   │
//! │                                                  commit                 │
//! │                                                                         │
//! │  Any error drops the UnitOfWork and the transaction rolls back.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use storefront_core::{Cart, CoreError, Product, TaxRate, User};
use storefront_db::{Database, DbError, UnitOfWork};

use crate::error::ServiceResult;

/// A cart together with the catalog records of its lines.
#[derive(Debug, Clone)]
pub struct CartDetails {
    pub cart: Cart,
    pub products: HashMap<String, Product>,
}

#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
    tax: TaxRate,
}

impl CartService {
    pub fn new(db: Database, tax: TaxRate) -> Self {
        CartService { db, tax }
    }

    /// Returns the user's cart, creating it if absent.
    ///
    /// Lines whose product no longer exists are pruned and the totals
    /// recomputed; the cart is written back only if something changed.
    pub async fn get_user_cart(&self, user_id: &str) -> ServiceResult<CartDetails> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        require_user(&mut uow, user_id).await?;

        let mut cart = uow.carts().lock_or_create(user_id, self.tax, now).await?;
        let products = load_catalog(&mut uow, &cart, None).await?;

        if cart.refresh(&products, self.tax, now) {
            debug!(user_id = %user_id, cart_id = %cart.id, "Cart totals refreshed");
            uow.carts().save(&cart).await?;
        }
        uow.commit().await?;

        Ok(CartDetails { cart, products })
    }

    /// Adds `qty` units of a product, merging with an existing line.
    pub async fn add_item(
        &self,
        user_id: &str,
        product_id: &str,
        qty: i64,
    ) -> ServiceResult<CartDetails> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        require_user(&mut uow, user_id).await?;

        let mut cart = uow.carts().lock_or_create(user_id, self.tax, now).await?;
        let products = load_catalog(&mut uow, &cart, Some(product_id)).await?;
        let product = products
            .get(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        cart.add_item(product, qty, now)?;
        cart.refresh(&products, self.tax, now);
        uow.carts().save(&cart).await?;
        uow.commit().await?;

        info!(
            user_id = %user_id,
            product_id = %product_id,
            qty = qty,
            grand_total = %cart.grand_total,
            "Item added to cart"
        );
        Ok(CartDetails { cart, products })
    }

    /// Sets the quantity of a line. `qty <= 0` removes the line.
    pub async fn update_qty(
        &self,
        user_id: &str,
        product_id: &str,
        qty: i64,
    ) -> ServiceResult<CartDetails> {
        if qty <= 0 {
            return self.remove_item(user_id, product_id).await;
        }

        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        require_user(&mut uow, user_id).await?;

        let mut cart = uow.carts().lock_or_create(user_id, self.tax, now).await?;
        let products = load_catalog(&mut uow, &cart, Some(product_id)).await?;
        let product = products
            .get(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        cart.set_quantity(product, qty, now)?;
        cart.refresh(&products, self.tax, now);
        uow.carts().save(&cart).await?;
        uow.commit().await?;

        info!(user_id = %user_id, product_id = %product_id, qty = qty, "Cart quantity updated");
        Ok(CartDetails { cart, products })
    }

    /// Removes a line. Removing an absent line is a no-op.
    pub async fn remove_item(&self, user_id: &str, product_id: &str) -> ServiceResult<CartDetails> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        require_user(&mut uow, user_id).await?;

        let mut cart = uow.carts().lock_or_create(user_id, self.tax, now).await?;
        let removed = cart.remove_item(product_id);
        let products = load_catalog(&mut uow, &cart, None).await?;

        if cart.refresh(&products, self.tax, now) || removed {
            uow.carts().save(&cart).await?;
        }
        uow.commit().await?;

        if removed {
            info!(user_id = %user_id, product_id = %product_id, "Item removed from cart");
        }
        Ok(CartDetails { cart, products })
    }

    /// Deletes every line and zeroes the totals.
    pub async fn clear(&self, user_id: &str) -> ServiceResult<Cart> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        require_user(&mut uow, user_id).await?;

        let mut cart = uow.carts().lock_or_create(user_id, self.tax, now).await?;
        cart.clear(now);
        uow.carts().save(&cart).await?;
        uow.commit().await?;

        info!(user_id = %user_id, cart_id = %cart.id, "Cart cleared");
        Ok(cart)
    }
}

/// Loads the user or fails with NOT_FOUND.
pub(crate) async fn require_user(uow: &mut UnitOfWork, user_id: &str) -> ServiceResult<User> {
    let user = uow
        .users()
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| DbError::not_found("User", user_id))?;
    Ok(user)
}

/// Current catalog records for every line of `cart`, plus `extra` if given.
pub(crate) async fn load_catalog(
    uow: &mut UnitOfWork,
    cart: &Cart,
    extra: Option<&str>,
) -> ServiceResult<HashMap<String, Product>> {
    let mut ids: Vec<String> = cart.items.iter().map(|i| i.product_id.clone()).collect();
    if let Some(id) = extra {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    Ok(uow.products().get_many(&ids).await?)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{file_db, seed_product, seed_user, test_db};
    use storefront_core::{Money, DEFAULT_TAX_RATE};

    #[tokio::test]
    async fn test_get_user_cart_creates_empty_cart() {
        let db = test_db().await;
        let (user, _) = seed_user(&db, "u1").await;
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        let first = service.get_user_cart(&user.id).await.unwrap();
        assert!(first.cart.is_empty());
        assert_eq!(first.cart.grand_total, Money::zero());

        let second = service.get_user_cart(&user.id).await.unwrap();
        assert_eq!(first.cart.id, second.cart.id);
    }

    #[tokio::test]
    async fn test_add_item_computes_totals() {
        let db = test_db().await;
        let (user, _) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 100_000, 5).await;
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        let details = service.add_item(&user.id, &product.id, 2).await.unwrap();
        let cart = details.cart;
        assert_eq!(cart.base_total, Money::from_units(200_000));
        assert_eq!(cart.tax_amount, Money::from_units(24_000));
        assert_eq!(cart.grand_total, Money::from_units(224_000));
        assert_eq!(cart.total_items, 2);

        let merged = service.add_item(&user.id, &product.id, 1).await.unwrap();
        assert_eq!(merged.cart.items.len(), 1);
        assert_eq!(merged.cart.total_items, 3);
    }

    #[tokio::test]
    async fn test_add_item_stock_boundary() {
        let db = test_db().await;
        let (user, _) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 10_000, 3).await;
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        service.add_item(&user.id, &product.id, 3).await.unwrap();

        let err = service.add_item(&user.id, &product.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfStock);

        // the failed add left the cart as it was
        let cart = service.get_user_cart(&user.id).await.unwrap().cart;
        assert_eq!(cart.total_items, 3);
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_totals() {
        let db = test_db().await;
        let (user, _) = seed_user(&db, "u1").await;
        let kopi = seed_product(&db, "kopi", 95_000, 10).await;
        let teh = seed_product(&db, "teh", 18_000, 10).await;
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        let before = service.add_item(&user.id, &kopi.id, 1).await.unwrap().cart;
        service.add_item(&user.id, &teh.id, 4).await.unwrap();
        let after = service.remove_item(&user.id, &teh.id).await.unwrap().cart;

        assert_eq!(after.base_total, before.base_total);
        assert_eq!(after.tax_amount, before.tax_amount);
        assert_eq!(after.grand_total, before.grand_total);
        assert_eq!(after.total_items, before.total_items);

        // removing again is a no-op
        let again = service.remove_item(&user.id, &teh.id).await.unwrap().cart;
        assert_eq!(again.grand_total, before.grand_total);
    }

    #[tokio::test]
    async fn test_update_qty() {
        let db = test_db().await;
        let (user, _) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 10_000, 4).await;
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        service.add_item(&user.id, &product.id, 1).await.unwrap();

        let cart = service.update_qty(&user.id, &product.id, 4).await.unwrap().cart;
        assert_eq!(cart.total_items, 4);

        let err = service.update_qty(&user.id, &product.id, 5).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfStock);

        let cart = service.update_qty(&user.id, &product.id, 0).await.unwrap().cart;
        assert!(cart.is_empty());
        assert_eq!(cart.grand_total, Money::zero());
    }

    #[tokio::test]
    async fn test_unknown_product_and_user() {
        let db = test_db().await;
        let (user, _) = seed_user(&db, "u1").await;
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        let err = service.add_item(&user.id, "missing", 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service.get_user_cart("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_mutations_across_users() {
        let (_dir, db) = file_db(8).await;
        let product = seed_product(&db, "p1", 1_000, 100_000).await;
        let mut users = Vec::new();
        for n in 0..16 {
            users.push(seed_user(&db, &format!("u{n}")).await.0);
        }
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        let mut tasks = tokio::task::JoinSet::new();
        for user in &users {
            for _ in 0..20 {
                let service = service.clone();
                let user_id = user.id.clone();
                let product_id = product.id.clone();
                tasks.spawn(async move {
                    service
                        .add_item(&user_id, &product_id, 1)
                        .await
                        .map(|_| ())
                });
            }
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined.unwrap() {
                failures.push(err.to_string());
            }
        }
        assert!(
            failures.is_empty(),
            "{} adds failed, first: {:?}",
            failures.len(),
            failures.first()
        );

        // no lost update: every add landed on its user's cart
        for user in &users {
            let cart = service.get_user_cart(&user.id).await.unwrap().cart;
            assert_eq!(cart.items.len(), 1);
            assert_eq!(cart.total_items, 20);
            assert_eq!(cart.base_total, Money::from_units(20_000));
        }
    }

    #[tokio::test]
    async fn test_invalid_quantity_rejected() {
        let db = test_db().await;
        let (user, _) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 10_000, 4).await;
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        let err = service.add_item(&user.id, &product.id, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_clear() {
        let db = test_db().await;
        let (user, _) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 10_000, 4).await;
        let service = CartService::new(db, DEFAULT_TAX_RATE);

        service.add_item(&user.id, &product.id, 2).await.unwrap();
        let cleared = service.clear(&user.id).await.unwrap();
        assert!(cleared.is_empty());

        let cart = service.get_user_cart(&user.id).await.unwrap().cart;
        assert!(cart.is_empty());
        assert_eq!(cart.total_items, 0);
    }
}
