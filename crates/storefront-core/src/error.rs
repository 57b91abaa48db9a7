//! # Error Types
//!
//! ```text
//! CoreError            rule broken by the shopper's request
//! ├── ProductNotFound
//! ├── OutOfStock       cart edit, order build or settlement
//! ├── EmptyCart
//! ├── CartNotOwned / AddressNotOwned
//! ├── QuantityTooLarge
//! └── Validation ────► ValidationError   malformed input
//! ```
//!
//! Both are shown to the shopper as-is, so the messages read as sentences.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product {0} is not in the catalog")]
    ProductNotFound(String),

    /// `product` is the display name, not the id.
    #[error("Insufficient stock for {product}: {available} left, {requested} wanted")]
    OutOfStock {
        product: String,
        available: i64,
        requested: i64,
    },

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Cart {0} belongs to another account")]
    CartNotOwned(String),

    #[error("Address {0} belongs to another account")]
    AddressNotOwned(String),

    /// A merged cart line went over the per-line cap.
    #[error("At most {max} of one product per order ({requested} requested)")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn out_of_stock(product: impl Into<String>, available: i64, requested: i64) -> Self {
        Self::OutOfStock {
            product: product.into(),
            available,
            requested,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Validation Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be from {min} to {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    #[error("{field} is invalid: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of {}", allowed.join(", "))]
    NotAllowed { field: String, allowed: Vec<String> },
}
