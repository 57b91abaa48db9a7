//! # Snap Request Builder
//!
//! Turns a persisted order into the Snap "create transaction" request.
//!
//! ## Rounding Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Snap only accepts whole Rupiah and rejects requests where             │
//! │  Σ(price × quantity) != gross_amount.                                   │
//! │                                                                         │
//! │  item lines      round(item.grand_total)      ─┐                        │
//! │  SHIPPING_FEE    round(order.shipping_cost)    ├─ Σ = G'                │
//! │                                               ─┘                        │
//! │  gross_amount    round(order.grand_total)      = G                      │
//! │                                                                         │
//! │  G != G'  ⇒  ADJUSTMENT line, price G − G', quantity 1                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An item whose rounded total does not divide evenly by its quantity is sent
//! as a single line of quantity 1 carrying the whole total, so no per-unit
//! rounding creeps in.

use serde::{Deserialize, Serialize};

use storefront_core::{Order, OrderCustomer, OrderItem};

/// Item id of the shipping line.
pub const SHIPPING_ITEM_ID: &str = "SHIPPING_FEE";

/// Item id of the rounding adjustment line.
pub const ADJUSTMENT_ITEM_ID: &str = "ADJUSTMENT";

/// Snap rejects longer item names.
pub const MAX_ITEM_NAME_CHARS: usize = 50;

/// ISO 3166 alpha-3 country code sent with every address.
pub const COUNTRY_CODE: &str = "IDN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapRequest {
    pub transaction_details: TransactionDetails,
    pub item_details: Vec<ItemDetail>,
    pub customer_details: CustomerDetails,
    pub callbacks: Callbacks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub billing_address: CustomerAddress,
    pub shipping_address: CustomerAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callbacks {
    pub finish: String,
    pub unfinish: String,
    pub error: String,
}

impl Callbacks {
    /// Landing URLs under `app_url` for `order_code`.
    pub fn for_order(app_url: &str, order_code: &str) -> Self {
        let base = app_url.trim_end_matches('/');
        Callbacks {
            finish: format!("{}/checkout/finish?order_id={}", base, order_code),
            unfinish: format!("{}/checkout/unfinish?order_id={}", base, order_code),
            error: format!("{}/checkout/error?order_id={}", base, order_code),
        }
    }
}

/// Successful Snap response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapResponse {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub redirect_url: String,
}

impl SnapRequest {
    /// Builds the request for a freshly created order.
    pub fn for_order(
        order: &Order,
        items: &[OrderItem],
        customer: &OrderCustomer,
        app_url: &str,
    ) -> Self {
        let gross_amount = order.grand_total.to_whole_units();

        SnapRequest {
            transaction_details: TransactionDetails {
                order_id: order.order_code.clone(),
                gross_amount,
            },
            item_details: build_item_details(order, items),
            customer_details: customer_details(customer),
            callbacks: Callbacks::for_order(app_url, &order.order_code),
        }
    }

    /// Σ price × quantity over all lines.
    pub fn items_total(&self) -> i64 {
        items_total(&self.item_details)
    }
}

/// Item lines, shipping line and (when needed) the adjustment line.
pub fn build_item_details(order: &Order, items: &[OrderItem]) -> Vec<ItemDetail> {
    let mut lines: Vec<ItemDetail> = items.iter().map(item_line).collect();

    lines.push(ItemDetail {
        id: SHIPPING_ITEM_ID.to_string(),
        name: truncate_name(&format!(
            "Shipping ({} - {})",
            order.shipping_service_code, order.shipping_service_name
        )),
        price: order.shipping_cost.to_whole_units(),
        quantity: 1,
    });

    let difference = order.grand_total.to_whole_units() - items_total(&lines);
    if difference != 0 {
        lines.push(ItemDetail {
            id: ADJUSTMENT_ITEM_ID.to_string(),
            name: "Price adjustment".to_string(),
            price: difference,
            quantity: 1,
        });
    }

    lines
}

fn item_line(item: &OrderItem) -> ItemDetail {
    let total = item.grand_total.to_whole_units();
    let (price, quantity) = if item.qty > 0 && total % item.qty == 0 {
        (total / item.qty, item.qty)
    } else {
        (total, 1)
    };

    ItemDetail {
        id: item.product_id.clone(),
        name: truncate_name(&item.product_name),
        price,
        quantity,
    }
}

fn items_total(lines: &[ItemDetail]) -> i64 {
    lines.iter().map(|l| l.price * l.quantity).sum()
}

fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_ITEM_NAME_CHARS).collect()
}

fn customer_details(customer: &OrderCustomer) -> CustomerDetails {
    let address = CustomerAddress {
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
        address: if customer.address2.trim().is_empty() {
            customer.address1.clone()
        } else {
            format!("{}, {}", customer.address1, customer.address2)
        },
        city: customer.location_name.clone(),
        postal_code: customer.post_code.clone(),
        country_code: COUNTRY_CODE.to_string(),
    };

    CustomerDetails {
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
        billing_address: address.clone(),
        shipping_address: address,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
