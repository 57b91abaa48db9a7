//! # Domain Types
//!
//! Core entities of the checkout engine.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  User ──1:1──► Cart ──owns──► CartItem*        (live projection)        │
//! │    │                                                                    │
//! │    ├──1:N──► Address                                                    │
//! │    │                                                                    │
//! │    └──1:N──► Order ──owns──► OrderItem*        (immutable snapshot)     │
//! │                 │ ──owns──► OrderCustomer      (exactly one)            │
//! │                 └ ──owns──► Payment            (exactly one)            │
//! │                                                                         │
//! │  Product is shared; Cart/Order lines reference it by id.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Money columns hold hundredths of the currency unit; percent columns hold
//! basis points. With the `sqlx` feature every entity derives `FromRow` and the
//! newtypes encode transparently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::{parse_fixed2, Money};

// =============================================================================
// Percent
// =============================================================================

/// A percentage in basis points (1 bps = 0.01%), i.e. decimal(10,2) percent.
///
/// `1200` bps = 12.00%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct Percent(u32);

/// Tax rates are plain percentages.
pub type TaxRate = Percent;

impl Percent {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

/// Formats as `12.00`.
impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Parses `"12"`, `"12.5"`, `"12.00"`. Must be within 0..=100.
impl FromStr for Percent {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bps = parse_fixed2(s).ok_or_else(|| ValidationError::InvalidFormat {
            field: "percent".to_string(),
            reason: format!("'{}' is not a decimal with at most two fraction digits", s),
        })?;

        if !(0..=10_000).contains(&bps) {
            return Err(ValidationError::OutOfRange {
                field: "percent".to_string(),
                min: 0,
                max: 100,
            });
        }

        Ok(Percent(bps as u32))
    }
}

// =============================================================================
// Weight
// =============================================================================

/// Product weight in hundredths of a gram (two-decimal precision).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct Weight(i64);

impl Weight {
    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Weight(hundredths)
    }

    #[inline]
    pub const fn from_grams(grams: i64) -> Self {
        Weight(grams * 100)
    }

    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn times(&self, qty: i64) -> Self {
        Weight(self.0 * qty)
    }
}

impl std::ops::Add for Weight {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Weight(self.0 + other.0)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// Stock is only decremented on confirmed payment and never goes negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub weight: Weight,
    /// Preferred over `discount_amount` when non-zero.
    pub discount_percent: Percent,
    /// Absolute per-unit discount.
    pub discount_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks whether `qty` units can be taken from stock.
    #[inline]
    pub fn has_stock(&self, qty: i64) -> bool {
        self.stock >= qty
    }
}

// =============================================================================
// User & Address
// =============================================================================

/// A registered customer (read-only to the checkout engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A shipping address in a user's address book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Address {
    pub id: String,
    pub user_id: String,
    /// Recipient name.
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub location_id: String,
    pub location_name: String,
    pub post_code: String,
    pub phone: String,
    pub email: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// Single-line rendering stored on the order as its shipping address.
    pub fn one_line(&self) -> String {
        let mut parts: Vec<&str> = vec![self.address1.trim()];
        if !self.address2.trim().is_empty() {
            parts.push(self.address2.trim());
        }
        let locality = format!("{} {}", self.location_name.trim(), self.post_code.trim());
        let locality = locality.trim();

        let mut line = parts.join(", ");
        if !locality.is_empty() {
            line.push_str(", ");
            line.push_str(locality);
        }
        line
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A user's single mutable cart.
///
/// Totals are always a recomputation of `items`; see [`crate::cart`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub base_total: Money,
    pub tax_percent: Percent,
    pub tax_amount: Money,
    /// No cart-level discount exists; kept at zero.
    pub discount_percent: Percent,
    pub discount_amount: Money,
    pub grand_total: Money,
    pub total_weight: Weight,
    pub total_items: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<CartItem>,
}

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub qty: i64,
    /// Product price at last recomputation.
    pub unit_price: Money,
    pub discount_per_unit: Money,
    /// `max(0, unit_price - discount_per_unit)`.
    pub final_unit_price: Money,
    /// `final_unit_price × qty`.
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Order lifecycle status, persisted as its integer code.
///
/// ```text
///    Pending ──paid──▶ Processing ──shipped──▶ Shipped ──done──▶ Completed
///       │                  │                                         │
///       │                  └──refund──▶ Refunded ◀──refund───────────┘
///       │
///       ├──deny/expire/cancel──▶ Cancelled
///       └──fraud──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
pub enum OrderStatus {
    Pending = 1,
    Processing = 2,
    Shipped = 3,
    Completed = 4,
    Cancelled = 5,
    Refunded = 6,
    Failed = 7,
}

impl OrderStatus {
    #[inline]
    pub const fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(OrderStatus::Pending),
            2 => Some(OrderStatus::Processing),
            3 => Some(OrderStatus::Shipped),
            4 => Some(OrderStatus::Completed),
            5 => Some(OrderStatus::Cancelled),
            6 => Some(OrderStatus::Refunded),
            7 => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    /// States with no outgoing edge.
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Refunded | OrderStatus::Failed
        )
    }

    /// States in which the order's stock has been taken.
    #[inline]
    pub const fn holds_stock(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Completed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::Failed => "Failed",
        };
        f.write_str(label)
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment status, persisted as its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    /// States with no outgoing edge.
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Paid" => Ok(PaymentStatus::Paid),
            "Failed" => Ok(PaymentStatus::Failed),
            "Cancelled" => Ok(PaymentStatus::Cancelled),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_status".to_string(),
                allowed: ["Pending", "Paid", "Failed", "Cancelled", "Refunded"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// An immutable record of a confirmed purchase intent.
///
/// Totals and `order_code` never change after creation; `status` and
/// `payment_status` are driven by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub order_code: String,
    pub base_total: Money,
    pub tax_percent: Percent,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub shipping_cost: Money,
    pub grand_total: Money,
    pub shipping_service_code: String,
    pub shipping_service_name: String,
    pub address_id: String,
    pub shipping_address: String,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A frozen order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub sku: String,
    pub qty: i64,
    /// Unit price before discount.
    pub price: Money,
    /// `price × qty`.
    pub base_total: Money,
    /// `discount_per_unit × qty`.
    pub discount_amount: Money,
    pub tax_percent: Percent,
    pub tax_amount: Money,
    /// `final_unit_price × qty`.
    pub subtotal: Money,
    /// `subtotal + tax_amount`, rounded to a whole unit.
    pub grand_total: Money,
    pub created_at: DateTime<Utc>,
}

/// Customer snapshot taken at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderCustomer {
    pub id: String,
    pub order_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address1: String,
    pub address2: String,
    pub location_id: String,
    pub location_name: String,
    pub post_code: String,
}

// =============================================================================
// Payment
// =============================================================================

/// Payment method recorded for gateway-hosted checkout.
pub const PAYMENT_METHOD_GATEWAY_SNAP: &str = "Gateway Snap";

/// The record bridging an order to the gateway transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    /// Gateway-side identifier (the order code).
    pub number: String,
    /// Always equal to the order's grand total.
    pub amount: Money,
    pub method: String,
    pub status: PaymentStatus,
    /// Snap token, set once the gateway accepts the transaction.
    pub token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_parse_and_display() {
        let p: Percent = "12.00".parse().unwrap();
        assert_eq!(p.bps(), 1200);
        assert_eq!(p.to_string(), "12.00");

        assert_eq!("7.5".parse::<Percent>().unwrap().bps(), 750);
        assert!("101".parse::<Percent>().is_err());
        assert!("-1".parse::<Percent>().is_err());
        assert!("abc".parse::<Percent>().is_err());
    }

    #[test]
    fn test_order_status_codes() {
        for code in 1..=7 {
            let status = OrderStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert!(OrderStatus::from_code(0).is_none());
        assert!(OrderStatus::from_code(8).is_none());
        assert_eq!(OrderStatus::Failed.code(), 7);
    }

    #[test]
    fn test_closed_states() {
        assert!(OrderStatus::Cancelled.is_closed());
        assert!(!OrderStatus::Processing.is_closed());
        assert!(!OrderStatus::Completed.is_closed());
        assert!(PaymentStatus::Refunded.is_closed());
        assert!(!PaymentStatus::Paid.is_closed());
    }

    #[test]
    fn test_payment_status_round_trip_names() {
        assert_eq!("Paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::Cancelled.to_string(), "Cancelled");
        assert!("paid".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_address_one_line() {
        let address = Address {
            id: "a1".to_string(),
            user_id: "u1".to_string(),
            name: "Budi".to_string(),
            address1: "Jl. Merdeka 1".to_string(),
            address2: String::new(),
            location_id: "152".to_string(),
            location_name: "Jakarta Pusat".to_string(),
            post_code: "10110".to_string(),
            phone: "0812".to_string(),
            email: "budi@example.com".to_string(),
            is_primary: true,
            created_at: Utc::now(),
        };
        assert_eq!(address.one_line(), "Jl. Merdeka 1, Jakarta Pusat 10110");
    }
}
