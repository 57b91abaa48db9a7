//! # Cart Aggregate
//!
//! In-memory rules for a user's single cart. The database layer loads a
//! [`Cart`] with its items inside a locked transaction, these methods mutate
//! it, and the repository writes it back before commit.
//!
//! ## Live Projection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The cart is NOT a price snapshot. Every refresh re-reads the product:  │
//! │                                                                         │
//! │  CartItem ──product_id──► Product (current price, discount, weight)     │
//! │       │                                                                 │
//! │       ├── product gone?  → line pruned                                  │
//! │       └── otherwise      → unit/discount/final/subtotal recomputed      │
//! │                                                                         │
//! │  base_total   = Σ subtotal                                              │
//! │  tax_amount   = base_total × TAX                                        │
//! │  grand_total  = base_total + tax_amount                                 │
//! │  total_items  = Σ qty                                                   │
//! │  total_weight = Σ weight × qty                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! OrderItems freeze these numbers at checkout; until then the price the
//! user sees follows the catalog.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::{calculate_grand_total, calculate_tax, recompute_item};
use crate::types::{Cart, CartItem, Percent, Product, TaxRate, Weight};
use crate::validation::{validate_cart_size, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

impl Cart {
    /// Creates an empty cart for `user_id`.
    pub fn new(user_id: impl Into<String>, tax: TaxRate, now: DateTime<Utc>) -> Self {
        Cart {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            base_total: Money::zero(),
            tax_percent: tax,
            tax_amount: Money::zero(),
            discount_percent: Percent::zero(),
            discount_amount: Money::zero(),
            grand_total: Money::zero(),
            total_weight: Weight::default(),
            total_items: 0,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Quantity currently held for `product_id` (0 if absent).
    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map(|item| item.qty)
            .unwrap_or(0)
    }

    /// Adds `qty` units of `product`, merging with an existing line.
    ///
    /// ## Errors
    /// - `Validation` if `qty <= 0`
    /// - `QuantityTooLarge` if the merged line exceeds the cap
    /// - `OutOfStock` if `product.stock < existing + qty`
    /// - `Validation` if a new line would exceed the line cap
    pub fn add_item(&mut self, product: &Product, qty: i64, now: DateTime<Utc>) -> CoreResult<()> {
        validate_quantity(qty)?;

        let existing = self.quantity_of(&product.id);
        let wanted = existing + qty;
        check_line_quantity(product, wanted)?;

        if existing == 0 {
            validate_cart_size(self.items.len())?;
        }
        self.upsert_line(product, wanted, now);
        Ok(())
    }

    /// Sets the line for `product` to `qty`. A non-positive `qty` removes it.
    pub fn set_quantity(&mut self, product: &Product, qty: i64, now: DateTime<Utc>) -> CoreResult<()> {
        if qty <= 0 {
            self.remove_item(&product.id);
            return Ok(());
        }

        check_line_quantity(product, qty)?;

        if self.quantity_of(&product.id) == 0 {
            validate_cart_size(self.items.len())?;
        }
        self.upsert_line(product, qty, now);
        Ok(())
    }

    /// Removes the line for `product_id`. Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    /// Drops every line and zeroes the totals.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.items.clear();
        self.base_total = Money::zero();
        self.tax_amount = Money::zero();
        self.discount_amount = Money::zero();
        self.grand_total = Money::zero();
        self.total_weight = Weight::default();
        self.total_items = 0;
        self.updated_at = now;
    }

    /// Re-projects every line onto `catalog` and recomputes the totals.
    ///
    /// Lines whose product is missing from `catalog` are pruned. Returns
    /// `true` if anything observable changed and the cart must be persisted.
    pub fn refresh(
        &mut self,
        catalog: &HashMap<String, Product>,
        tax: TaxRate,
        now: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;

        let before = self.items.len();
        self.items
            .retain(|item| catalog.contains_key(&item.product_id));
        if self.items.len() != before {
            changed = true;
        }

        let mut base_total = Money::zero();
        let mut total_weight = Weight::default();
        let mut total_items = 0;

        for item in &mut self.items {
            let Some(product) = catalog.get(&item.product_id) else {
                continue;
            };

            let pricing = recompute_item(product, item.qty);
            if item.unit_price != pricing.unit_price
                || item.discount_per_unit != pricing.discount_per_unit
                || item.final_unit_price != pricing.final_unit_price
                || item.subtotal != pricing.subtotal
            {
                item.unit_price = pricing.unit_price;
                item.discount_per_unit = pricing.discount_per_unit;
                item.final_unit_price = pricing.final_unit_price;
                item.subtotal = pricing.subtotal;
                item.updated_at = now;
                changed = true;
            }

            base_total += item.subtotal;
            total_weight = total_weight + product.weight.times(item.qty);
            total_items += item.qty;
        }

        let tax_amount = calculate_tax(base_total, tax);
        let grand_total = calculate_grand_total(base_total, tax_amount, Money::zero());

        if self.base_total != base_total
            || self.tax_percent != tax
            || self.tax_amount != tax_amount
            || self.grand_total != grand_total
            || self.total_weight != total_weight
            || self.total_items != total_items
            || !self.discount_amount.is_zero()
        {
            self.base_total = base_total;
            self.tax_percent = tax;
            self.tax_amount = tax_amount;
            self.discount_percent = Percent::zero();
            self.discount_amount = Money::zero();
            self.grand_total = grand_total;
            self.total_weight = total_weight;
            self.total_items = total_items;
            changed = true;
        }

        if changed {
            self.updated_at = now;
        }
        changed
    }

    fn upsert_line(&mut self, product: &Product, qty: i64, now: DateTime<Utc>) {
        let pricing = recompute_item(product, qty);

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            item.qty = qty;
            item.unit_price = pricing.unit_price;
            item.discount_per_unit = pricing.discount_per_unit;
            item.final_unit_price = pricing.final_unit_price;
            item.subtotal = pricing.subtotal;
            item.updated_at = now;
            return;
        }

        self.items.push(CartItem {
            id: Uuid::new_v4().to_string(),
            cart_id: self.id.clone(),
            product_id: product.id.clone(),
            qty,
            unit_price: pricing.unit_price,
            discount_per_unit: pricing.discount_per_unit,
            final_unit_price: pricing.final_unit_price,
            subtotal: pricing.subtotal,
            created_at: now,
            updated_at: now,
        });
    }
}

fn check_line_quantity(product: &Product, qty: i64) -> CoreResult<()> {
    if qty > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: qty,
            max: MAX_ITEM_QUANTITY,
        });
    }

    if !product.has_stock(qty) {
        return Err(CoreError::out_of_stock(&product.name, product.stock, qty));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_TAX_RATE;

    fn test_product(id: &str, price_units: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            price: Money::from_units(price_units),
            stock,
            weight: Weight::from_grams(500),
            discount_percent: Percent::zero(),
            discount_amount: Money::zero(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: &[&Product]) -> HashMap<String, Product> {
        products
            .iter()
            .map(|p| (p.id.clone(), (*p).clone()))
            .collect()
    }

    #[test]
    fn test_add_item_single_purchase_totals() {
        let p = test_product("p", 100_000, 5);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());

        cart.add_item(&p, 2, Utc::now()).unwrap();
        assert!(cart.refresh(&catalog(&[&p]), DEFAULT_TAX_RATE, Utc::now()));

        assert_eq!(cart.base_total, Money::from_units(200_000));
        assert_eq!(cart.tax_amount, Money::from_units(24_000));
        assert_eq!(cart.grand_total, Money::from_units(224_000));
        assert_eq!(cart.total_items, 2);
        assert_eq!(cart.total_weight, Weight::from_grams(1_000));
    }

    #[test]
    fn test_add_same_product_merges_line() {
        let p = test_product("p", 10_000, 10);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());

        cart.add_item(&p, 2, Utc::now()).unwrap();
        cart.add_item(&p, 3, Utc::now()).unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.quantity_of("p"), 5);
    }

    #[test]
    fn test_add_item_stock_boundary() {
        let p = test_product("p", 10_000, 3);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());

        assert!(cart.add_item(&p, 3, Utc::now()).is_ok());

        let mut other = Cart::new("u2", DEFAULT_TAX_RATE, Utc::now());
        let err = other.add_item(&p, 4, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::OutOfStock {
                available: 3,
                requested: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_add_counts_existing_quantity_against_stock() {
        let p = test_product("p", 10_000, 3);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());

        cart.add_item(&p, 2, Utc::now()).unwrap();
        let err = cart.add_item(&p, 2, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::OutOfStock { requested: 4, .. }));
        assert_eq!(cart.quantity_of("p"), 2);
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let p = test_product("p", 10_000, 3);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());

        assert!(matches!(
            cart.add_item(&p, 0, Utc::now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let p = test_product("p", 10_000, 3);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());

        cart.add_item(&p, 2, Utc::now()).unwrap();
        cart.set_quantity(&p, 0, Utc::now()).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_checks_stock() {
        let p = test_product("p", 10_000, 3);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());

        cart.add_item(&p, 1, Utc::now()).unwrap();
        assert!(cart.set_quantity(&p, 3, Utc::now()).is_ok());
        assert!(matches!(
            cart.set_quantity(&p, 4, Utc::now()),
            Err(CoreError::OutOfStock { .. })
        ));
        assert_eq!(cart.quantity_of("p"), 3);
    }

    #[test]
    fn test_add_then_remove_restores_totals() {
        let a = test_product("a", 25_000, 10);
        let b = test_product("b", 40_000, 10);
        let products = catalog(&[&a, &b]);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());

        cart.add_item(&a, 2, Utc::now()).unwrap();
        cart.refresh(&products, DEFAULT_TAX_RATE, Utc::now());
        let before = (cart.base_total, cart.tax_amount, cart.grand_total, cart.total_items);

        cart.add_item(&b, 1, Utc::now()).unwrap();
        cart.refresh(&products, DEFAULT_TAX_RATE, Utc::now());
        assert!(cart.remove_item("b"));
        cart.refresh(&products, DEFAULT_TAX_RATE, Utc::now());

        let after = (cart.base_total, cart.tax_amount, cart.grand_total, cart.total_items);
        assert_eq!(before, after);
    }

    #[test]
    fn test_refresh_prunes_missing_products() {
        let a = test_product("a", 25_000, 10);
        let b = test_product("b", 40_000, 10);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());
        cart.add_item(&a, 1, Utc::now()).unwrap();
        cart.add_item(&b, 1, Utc::now()).unwrap();
        cart.refresh(&catalog(&[&a, &b]), DEFAULT_TAX_RATE, Utc::now());

        assert!(cart.refresh(&catalog(&[&a]), DEFAULT_TAX_RATE, Utc::now()));
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.base_total, Money::from_units(25_000));
    }

    #[test]
    fn test_refresh_follows_price_changes() {
        let mut p = test_product("p", 10_000, 10);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());
        cart.add_item(&p, 2, Utc::now()).unwrap();
        cart.refresh(&catalog(&[&p]), DEFAULT_TAX_RATE, Utc::now());

        assert!(!cart.refresh(&catalog(&[&p]), DEFAULT_TAX_RATE, Utc::now()));

        p.price = Money::from_units(12_000);
        assert!(cart.refresh(&catalog(&[&p]), DEFAULT_TAX_RATE, Utc::now()));
        assert_eq!(cart.items[0].unit_price, Money::from_units(12_000));
        assert_eq!(cart.base_total, Money::from_units(24_000));
    }

    #[test]
    fn test_clear_zeroes_totals() {
        let p = test_product("p", 10_000, 10);
        let mut cart = Cart::new("u1", DEFAULT_TAX_RATE, Utc::now());
        cart.add_item(&p, 2, Utc::now()).unwrap();
        cart.refresh(&catalog(&[&p]), DEFAULT_TAX_RATE, Utc::now());

        cart.clear(Utc::now());
        assert!(cart.is_empty());
        assert_eq!(cart.grand_total, Money::zero());
        assert_eq!(cart.total_items, 0);
    }
}
