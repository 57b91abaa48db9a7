//! # Pricing Primitives
//!
//! Discount, tax and grand-total arithmetic shared by the cart and the order
//! builder. Everything here rounds half-up to two decimals.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product.price ─┬─ discount_percent > 0 ? price × pct                   │
//! │                 └─ otherwise              discount_amount               │
//! │                        │                                                │
//! │                        ▼                                                │
//! │  final_unit_price = max(0, price − discount_per_unit)                   │
//! │  subtotal         = final_unit_price × qty                              │
//! │  tax              = subtotal × TAX / 100       (shipping never taxed)   │
//! │  grand_total      = base + tax − discount                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Percent, Product, TaxRate};

/// `base × pct / 100`.
pub fn calculate_discount(base: Money, pct: Percent) -> Money {
    base.percentage(pct.bps())
}

/// `base_after_discount × tax / 100`.
pub fn calculate_tax(base_after_discount: Money, tax: TaxRate) -> Money {
    base_after_discount.calculate_tax(tax)
}

/// `base + tax − discount`.
pub fn calculate_grand_total(base: Money, tax: Money, discount: Money) -> Money {
    base + tax - discount
}

/// Per-line pricing derived from the current product record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    pub unit_price: Money,
    pub discount_per_unit: Money,
    pub final_unit_price: Money,
    pub subtotal: Money,
}

/// Prices `qty` units of `product`.
///
/// A percentage discount wins over the absolute amount when it is non-zero.
pub fn recompute_item(product: &Product, qty: i64) -> LinePricing {
    let discount_per_unit = if product.discount_percent.is_zero() {
        product.discount_amount
    } else {
        calculate_discount(product.price, product.discount_percent)
    };

    let final_unit_price = (product.price - discount_per_unit).non_negative();

    LinePricing {
        unit_price: product.price,
        discount_per_unit,
        final_unit_price,
        subtotal: final_unit_price.multiply_quantity(qty),
    }
}
