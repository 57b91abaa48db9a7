//! # Order Builder
//!
//! Freezes a cart into an immutable order draft: the order header, one
//! [`OrderItem`] per cart line, the [`OrderCustomer`] snapshot and the pending
//! [`Payment`]. The database layer persists the draft inside the checkout
//! transaction.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  build_order(user, address, cart, catalog, shipping)                    │
//! │       │                                                                 │
//! │       ├── address.user_id == user.id ?     → AddressNotOwned            │
//! │       ├── cart.user_id == user.id ?        → CartNotOwned               │
//! │       ├── cart has lines ?                 → EmptyCart                  │
//! │       ├── every product exists ?           → OutOfStock (0 available)   │
//! │       └── every product.stock >= qty ?     → OutOfStock                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OrderDraft { order(Pending), items, customer, payment(Pending) }       │
//! │                                                                         │
//! │  Stock is NOT decremented and the cart is NOT cleared here:             │
//! │  both wait for a confirmed payment.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::{calculate_tax, recompute_item};
use crate::types::{
    Address, Cart, Order, OrderCustomer, OrderItem, OrderStatus, Payment, PaymentStatus, Product,
    TaxRate, User, PAYMENT_METHOD_GATEWAY_SNAP,
};
use crate::validation::{validate_required, validate_shipping_cost};

/// Prefix of every order code.
pub const ORDER_CODE_PREFIX: &str = "INV";

/// The shipping option the user picked at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    pub service_code: String,
    pub service_name: String,
    pub cost: Money,
}

impl ShippingSelection {
    pub fn validate(&self) -> CoreResult<()> {
        validate_required("shipping_service_code", &self.service_code, 50)?;
        validate_required("shipping_service_name", &self.service_name, 100)?;
        validate_shipping_cost(self.cost)?;
        Ok(())
    }
}

/// Everything the checkout transaction writes for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub customer: OrderCustomer,
    pub payment: Payment,
}

impl OrderDraft {
    /// Replaces the order code, keeping the payment number in step.
    ///
    /// Used when the generated code collides with an existing order.
    pub fn with_order_code(mut self, code: String) -> Self {
        self.payment.number = code.clone();
        self.order.order_code = code;
        self
    }
}

/// Generates `INV-YYYYMMDD-XXXXXXXX` with an 8-character random suffix.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use storefront_core::order::generate_order_code;
///
/// let code = generate_order_code(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
/// assert!(code.starts_with("INV-20250601-"));
/// assert_eq!(code.len(), 21);
/// ```
pub fn generate_order_code(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase();

    format!("{}-{}-{}", ORDER_CODE_PREFIX, now.format("%Y%m%d"), suffix)
}

/// Splits a full name on whitespace: first word, then the rest.
///
/// ```rust
/// use storefront_core::order::split_name;
///
/// assert_eq!(split_name("Siti Nur Aisyah"), ("Siti".to_string(), "Nur Aisyah".to_string()));
/// assert_eq!(split_name("Budi"), ("Budi".to_string(), String::new()));
/// ```
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Builds an order draft from a refreshed cart.
///
/// `catalog` must contain the current record of every product in the cart,
/// read inside the checkout transaction.
pub fn build_order(
    user: &User,
    address: &Address,
    cart: &Cart,
    catalog: &HashMap<String, Product>,
    shipping: &ShippingSelection,
    tax: TaxRate,
    now: DateTime<Utc>,
) -> CoreResult<OrderDraft> {
    shipping.validate()?;

    if address.user_id != user.id {
        return Err(CoreError::AddressNotOwned(address.id.clone()));
    }
    if cart.user_id != user.id {
        return Err(CoreError::CartNotOwned(cart.id.clone()));
    }
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let order_id = Uuid::new_v4().to_string();
    let order_code = generate_order_code(now);

    let mut items = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        let product = catalog
            .get(&line.product_id)
            .ok_or_else(|| CoreError::out_of_stock(&line.product_id, 0, line.qty))?;

        if !product.has_stock(line.qty) {
            return Err(CoreError::out_of_stock(&product.name, product.stock, line.qty));
        }

        let pricing = recompute_item(product, line.qty);
        let tax_amount = calculate_tax(pricing.subtotal, tax);

        items.push(OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            sku: product.sku.clone(),
            qty: line.qty,
            price: pricing.unit_price,
            base_total: pricing.unit_price.multiply_quantity(line.qty),
            discount_amount: pricing.discount_per_unit.multiply_quantity(line.qty),
            tax_percent: tax,
            tax_amount,
            subtotal: pricing.subtotal,
            grand_total: (pricing.subtotal + tax_amount).round_to_unit(),
            created_at: now,
        });
    }

    let shipping_cost = shipping.cost.round_to_unit();
    let grand_total = cart.grand_total + shipping_cost;

    let order = Order {
        id: order_id.clone(),
        user_id: user.id.clone(),
        order_code: order_code.clone(),
        base_total: cart.base_total,
        tax_percent: cart.tax_percent,
        tax_amount: cart.tax_amount,
        discount_amount: cart.discount_amount,
        shipping_cost,
        grand_total,
        shipping_service_code: shipping.service_code.trim().to_string(),
        shipping_service_name: shipping.service_name.trim().to_string(),
        address_id: address.id.clone(),
        shipping_address: address.one_line(),
        payment_status: PaymentStatus::Pending,
        status: OrderStatus::Pending,
        order_date: now,
        created_at: now,
        updated_at: now,
    };

    let (first_name, last_name) = split_name(&user.full_name());
    let customer = OrderCustomer {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.clone(),
        first_name,
        last_name,
        email: non_empty_or(&address.email, &user.email),
        phone: non_empty_or(&address.phone, &user.phone),
        address1: address.address1.clone(),
        address2: address.address2.clone(),
        location_id: address.location_id.clone(),
        location_name: address.location_name.clone(),
        post_code: address.post_code.clone(),
    };

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        order_id,
        number: order_code,
        amount: grand_total,
        method: PAYMENT_METHOD_GATEWAY_SNAP.to_string(),
        status: PaymentStatus::Pending,
        token: None,
        created_at: now,
        updated_at: now,
    };

    Ok(OrderDraft {
        order,
        items,
        customer,
        payment,
    })
}

fn non_empty_or(preferred: &str, fallback: &str) -> String {
    if preferred.trim().is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
