//! # storefront-core: Pure Business Logic for the Storefront
//!
//! This crate holds every checkout rule as pure functions with zero I/O
//! dependencies: pricing, the cart aggregate, the order builder and the
//! payment reconciliation decision table.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 storefront-api (axum)                           │   │
//! │  │   /carts ──► /checkout/initiate ──► /checkout/notify            │   │
//! │  └───────────────┬──────────────────────────────┬──────────────────┘   │
//! │                  │                              │                      │
//! │  ┌───────────────▼──────────────────┐  ┌────────▼─────────────────┐   │
//! │  │ ★ storefront-core (THIS CRATE) ★ │  │   storefront-gateway     │   │
//! │  │                                  │  │   Snap + status API      │   │
//! │  │  money  pricing  cart  order     │  └──────────────────────────┘   │
//! │  │  reconcile  validation  types    │                                 │
//! │  │                                  │                                 │
//! │  │  NO I/O • NO DATABASE • NO NET   │                                 │
//! │  └───────────────┬──────────────────┘                                 │
//! │                  │                                                     │
//! │  ┌───────────────▼─────────────────────────────────────────────────┐   │
//! │  │              storefront-db (SQLite via sqlx)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Cart, Order, Payment, ...)
//! - [`money`] - Money type with integer cents
//! - [`pricing`] - Discount, tax and line pricing
//! - [`cart`] - Cart aggregate operations
//! - [`order`] - Cart → order draft
//! - [`reconcile`] - Payment notification decisions
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::money::Money;
//! use storefront_core::DEFAULT_TAX_RATE;
//!
//! let subtotal = Money::from_units(200_000);
//! let tax = subtotal.calculate_tax(DEFAULT_TAX_RATE);
//!
//! assert_eq!(tax, Money::from_units(24_000));
//! assert_eq!((subtotal + tax).to_string(), "Rp224.000");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod order;
pub mod pricing;
pub mod reconcile;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order::{OrderDraft, ShippingSelection};
pub use reconcile::{Classification, Decision};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tax applied to carts and orders when no override is configured (12%).
pub const DEFAULT_TAX_RATE: Percent = Percent::from_bps(1200);

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches typos such as 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;
