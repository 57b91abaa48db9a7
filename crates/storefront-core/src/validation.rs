//! Request checks that run before a transaction is opened.
//!
//! Anything that depends on stored state (stock, ownership) is checked
//! later, inside the transaction. The schema repeats the hard limits as
//! `CHECK` constraints.

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

type Checked = Result<(), ValidationError>;

/// Non-blank after trimming and at most `max` characters.
pub fn validate_required(field: &str, value: &str, max: usize) -> Checked {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Required {
            field: field.to_owned(),
        })
    } else if trimmed.chars().count() > max {
        Err(ValidationError::TooLong {
            field: field.to_owned(),
            max,
        })
    } else {
        Ok(())
    }
}

/// Quantity of a single cart line: `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> Checked {
    match qty {
        q if q <= 0 => Err(ValidationError::MustBePositive {
            field: "quantity".to_owned(),
        }),
        q if q > MAX_ITEM_QUANTITY => Err(ValidationError::OutOfRange {
            field: "quantity".to_owned(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        }),
        _ => Ok(()),
    }
}

/// Free shipping (zero) is accepted.
pub fn validate_shipping_cost(cost: Money) -> Checked {
    non_negative("shipping_cost", cost)
}

/// Called with the line count *before* a new product is added.
pub fn validate_cart_size(lines: usize) -> Checked {
    if lines < MAX_CART_ITEMS {
        return Ok(());
    }
    Err(ValidationError::OutOfRange {
        field: "cart items".to_owned(),
        min: 0,
        max: MAX_CART_ITEMS as i64,
    })
}

fn non_negative(field: &str, amount: Money) -> Checked {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_owned(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}
