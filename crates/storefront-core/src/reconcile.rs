//! # Reconciliation Decisions
//!
//! Pure decision logic behind the payment notification handler. The handler
//! re-verifies the notification against the gateway, loads the order, then
//! asks this module two questions:
//!
//! 1. Does the current state accept the incoming transition? ([`should_skip`])
//! 2. What exactly changes? ([`classify`])
//!
//! ## Decision Table
//! ```text
//! ┌──────────────────────┬─────────────┬──────────┬────────────┬──────────────────────────────┐
//! │ transaction_status   │ fraud       │ payment  │ order      │ stock / cart                 │
//! ├──────────────────────┼─────────────┼──────────┼────────────┼──────────────────────────────┤
//! │ capture, settlement  │ accept, ""  │ Paid     │ Processing │ reduce if Pending, clear cart│
//! │ capture, settlement  │ other       │ Failed   │ Failed     │ return if stock was taken    │
//! │ pending              │ -           │ Pending  │ Pending    │ -                            │
//! │ deny, expire, cancel │ -           │ Failed   │ Cancelled  │ return if stock was taken    │
//! │ refund, partial_...  │ -           │ Refunded │ Refunded   │ return if stock was taken    │
//! │ anything else        │ -           │ ignored                                             │
//! └──────────────────────┴─────────────┴──────────┴────────────┴──────────────────────────────┘
//! ```
//!
//! Stock is taken exactly once, on the Pending → Processing edge, so "stock was
//! taken" means the order currently sits in Processing, Shipped or Completed.

use serde::{Deserialize, Serialize};

use crate::types::{Order, OrderStatus, PaymentStatus};

/// Transaction status reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Expire,
    Cancel,
    Refund,
    PartialRefund,
    Other(String),
}

impl TransactionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "capture" => TransactionStatus::Capture,
            "settlement" => TransactionStatus::Settlement,
            "pending" => TransactionStatus::Pending,
            "deny" => TransactionStatus::Deny,
            "expire" => TransactionStatus::Expire,
            "cancel" => TransactionStatus::Cancel,
            "refund" => TransactionStatus::Refund,
            "partial_refund" => TransactionStatus::PartialRefund,
            other => TransactionStatus::Other(other.to_string()),
        }
    }
}

/// The state change a notification asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub reduce_stock: bool,
    pub refund_stock: bool,
    pub clear_cart: bool,
}

impl Decision {
    /// True for transitions that may follow a successful payment.
    pub fn is_reversal(&self) -> bool {
        matches!(
            self.payment_status,
            PaymentStatus::Refunded | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// True when applying the decision would change nothing.
    pub fn is_noop_for(&self, order: &Order, payment_status: PaymentStatus) -> bool {
        !self.reduce_stock
            && !self.refund_stock
            && !self.clear_cart
            && order.status == self.order_status
            && order.payment_status == self.payment_status
            && payment_status == self.payment_status
    }
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Apply(Decision),
    /// Unrecognized transaction status; acknowledged and dropped.
    Ignore(String),
}

/// Maps the authoritative gateway status onto a [`Decision`] for `order`.
pub fn classify(transaction_status: &str, fraud_status: &str, order: &Order) -> Classification {
    let stock_taken = order.status.holds_stock();

    let decision = match TransactionStatus::parse(transaction_status) {
        TransactionStatus::Capture | TransactionStatus::Settlement => {
            let fraud = fraud_status.trim().to_ascii_lowercase();
            if fraud.is_empty() || fraud == "accept" {
                Decision {
                    payment_status: PaymentStatus::Paid,
                    order_status: OrderStatus::Processing,
                    reduce_stock: order.status == OrderStatus::Pending,
                    refund_stock: false,
                    clear_cart: true,
                }
            } else {
                Decision {
                    payment_status: PaymentStatus::Failed,
                    order_status: OrderStatus::Failed,
                    reduce_stock: false,
                    refund_stock: stock_taken,
                    clear_cart: false,
                }
            }
        }
        TransactionStatus::Pending => Decision {
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Pending,
            reduce_stock: false,
            refund_stock: false,
            clear_cart: false,
        },
        TransactionStatus::Deny | TransactionStatus::Expire | TransactionStatus::Cancel => {
            Decision {
                payment_status: PaymentStatus::Failed,
                order_status: OrderStatus::Cancelled,
                reduce_stock: false,
                refund_stock: stock_taken,
                clear_cart: false,
            }
        }
        TransactionStatus::Refund | TransactionStatus::PartialRefund => Decision {
            payment_status: PaymentStatus::Refunded,
            order_status: OrderStatus::Refunded,
            reduce_stock: false,
            refund_stock: stock_taken,
            clear_cart: false,
        },
        TransactionStatus::Other(raw) => return Classification::Ignore(raw),
    };

    Classification::Apply(decision)
}

/// Returns true when the notification must be acknowledged without effects.
///
/// Closed states have no outgoing edge. A paid order only accepts reversals,
/// so a replayed settlement is dropped while a later refund still applies.
pub fn should_skip(order: &Order, payment_status: PaymentStatus, decision: &Decision) -> bool {
    if payment_status.is_closed() || order.status.is_closed() {
        return true;
    }

    if payment_status == PaymentStatus::Paid && !decision.is_reversal() {
        return true;
    }

    decision.is_noop_for(order, payment_status)
}

// =============================================================================
// Unit Tests
// =============================================================================
