//! # Notification Reconciler
//!
//! Drives payment, order, stock and cart state from the gateway's
//! asynchronous notifications. Replays are safe: the idempotency guard drops
//! anything that would not change state.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  raw body ─► decode ─► verify signature ─────────────────► 400 on fail  │
//! │                            │                                            │
//! │                            ▼                                            │
//! │              gateway.check_transaction(order_code)                      │
//! │                 ├── UnknownOrder ───────────────────────► 200           │
//! │                 ├── Transient / Rejected ───────────────► 500 (retry)   │
//! │                 └── authoritative status                                │
//! │                            │                                            │
//! │  BEGIN                     ▼                                            │
//! │    lock order ─► payment ─► classify ─► guard ── skip ──► 200           │
//! │                                           │                             │
//! │    UPDATE payment.status, order.{status, payment_status}                │
//! │    reduce_stock:  lock product ─► conditional decrement                 │
//! │                   └── short ─► ROLLBACK ─► mark Failed ─► 200           │
//! │    refund_stock:  lock product ─► increment                             │
//! │    clear_cart:    empty the user's cart                                 │
//! │  COMMIT ─► unbind session cart ─────────────────────────► 200           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use storefront_core::reconcile::{classify, should_skip};
use storefront_core::{Classification, Decision, Money, OrderItem, OrderStatus, PaymentStatus};
use storefront_db::{Database, DbError, UnitOfWork};
use storefront_gateway::{GatewayError, Notification, PaymentGateway, TransactionCheck};

use crate::error::ServiceResult;
use crate::sessions::SessionStore;

/// How a notification was handled. Every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// State changed.
    Applied {
        order_code: String,
        decision: Decision,
    },
    /// The guard fired; nothing changed.
    Duplicate { order_code: String },
    /// Transaction status outside the decision table.
    Ignored {
        order_code: String,
        transaction_status: String,
    },
    /// The gateway does not know the order.
    UnknownOrder { order_code: String },
    /// Settlement found too little stock; the order was failed instead.
    StockConflict {
        order_code: String,
        product_id: String,
        available: i64,
        requested: i64,
    },
}

#[derive(Clone)]
pub struct Reconciler {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    sessions: SessionStore,
    server_key: String,
    verify_signature: bool,
}

impl Reconciler {
    pub fn new(
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        sessions: SessionStore,
        server_key: impl Into<String>,
        verify_signature: bool,
    ) -> Self {
        Reconciler {
            db,
            gateway,
            sessions,
            server_key: server_key.into(),
            verify_signature,
        }
    }

    /// Handles one raw notification body.
    pub async fn handle(&self, body: &[u8]) -> ServiceResult<ReconcileOutcome> {
        let notification = Notification::from_slice(body)?;
        let order_code = notification.order_id.clone();

        if self.verify_signature {
            if let Err(err) = notification.verify(&self.server_key) {
                warn!(order_code = %order_code, "Notification signature mismatch");
                return Err(err.into());
            }
        }

        let check = match self.gateway.check_transaction(&order_code).await {
            Ok(check) => check,
            Err(GatewayError::UnknownOrder(_)) => {
                warn!(order_code = %order_code, "Gateway has no transaction for notified order");
                return Ok(ReconcileOutcome::UnknownOrder { order_code });
            }
            Err(err) => {
                warn!(order_code = %order_code, error = %err, "Transaction status check failed");
                return Err(err.into());
            }
        };

        report_disagreement(&notification, &check);

        self.apply(
            &order_code,
            &check.transaction_status,
            check.fraud_status.as_deref().unwrap_or_default(),
        )
        .await
    }

    /// Applies an authoritative status to the order in one transaction.
    pub async fn apply(
        &self,
        order_code: &str,
        transaction_status: &str,
        fraud_status: &str,
    ) -> ServiceResult<ReconcileOutcome> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let order = uow
            .orders()
            .lock_by_code(order_code)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_code))?;
        let payment = uow
            .payments()
            .find_by_order(&order.id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", &order.id))?;

        let decision = match classify(transaction_status, fraud_status, &order) {
            Classification::Apply(decision) => decision,
            Classification::Ignore(raw) => {
                info!(order_code = %order_code, transaction_status = %raw, "Ignoring transaction status");
                return Ok(ReconcileOutcome::Ignored {
                    order_code: order_code.to_string(),
                    transaction_status: raw,
                });
            }
        };

        if should_skip(&order, payment.status, &decision) {
            warn!(
                order_code = %order_code,
                order_status = %order.status,
                payment_status = %payment.status,
                transaction_status = %transaction_status,
                "Duplicate notification, no state change"
            );
            return Ok(ReconcileOutcome::Duplicate {
                order_code: order_code.to_string(),
            });
        }

        let items = uow.orders().items(&order.id).await?;

        uow.payments()
            .update_status(&payment.id, decision.payment_status, now)
            .await?;
        uow.orders()
            .update_status(&order.id, decision.order_status, decision.payment_status, now)
            .await?;

        if decision.reduce_stock {
            if let Some(shortage) = reduce_stock(&mut uow, &items).await? {
                uow.rollback().await?;
                warn!(
                    order_code = %order_code,
                    product_id = %shortage.product_id,
                    available = shortage.available,
                    requested = shortage.requested,
                    "Out of stock at settlement, failing order"
                );
                if !self.mark_failed(order_code).await? {
                    return Ok(ReconcileOutcome::Duplicate {
                        order_code: order_code.to_string(),
                    });
                }
                return Ok(ReconcileOutcome::StockConflict {
                    order_code: order_code.to_string(),
                    product_id: shortage.product_id,
                    available: shortage.available,
                    requested: shortage.requested,
                });
            }
        }

        if decision.refund_stock {
            refund_stock(&mut uow, &items).await?;
        }

        let cleared_cart = if decision.clear_cart {
            uow.carts().clear_for_user(&order.user_id, now).await?
        } else {
            None
        };

        uow.commit().await?;

        if decision.clear_cart {
            self.sessions.unbind_cart(&order.user_id);
            if let Some(cart_id) = cleared_cart {
                info!(order_code = %order_code, cart_id = %cart_id, "Cart cleared after payment");
            }
        }

        info!(
            order_code = %order_code,
            from = %order.status,
            to = %decision.order_status,
            payment_status = %decision.payment_status,
            stock_reduced = decision.reduce_stock,
            stock_refunded = decision.refund_stock,
            "Payment status applied"
        );

        Ok(ReconcileOutcome::Applied {
            order_code: order_code.to_string(),
            decision,
        })
    }

    /// Fails an order whose settlement could not be fulfilled.
    ///
    /// Runs after the settlement transaction rolled back, so another
    /// notification may have moved the order in between. Only an order still
    /// waiting for payment is failed; returns false when it was left alone.
    async fn mark_failed(&self, order_code: &str) -> ServiceResult<bool> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let order = uow
            .orders()
            .lock_by_code(order_code)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_code))?;
        let payment = uow
            .payments()
            .find_by_order(&order.id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", &order.id))?;

        let failed = Decision {
            payment_status: PaymentStatus::Failed,
            order_status: OrderStatus::Failed,
            reduce_stock: false,
            refund_stock: false,
            clear_cart: false,
        };
        if payment.status == PaymentStatus::Paid
            || order.status.holds_stock()
            || should_skip(&order, payment.status, &failed)
        {
            info!(
                order_code = %order_code,
                order_status = %order.status,
                payment_status = %payment.status,
                "Order moved on before it could be failed, leaving it"
            );
            return Ok(false);
        }

        uow.payments()
            .update_status(&payment.id, PaymentStatus::Failed, now)
            .await?;
        uow.orders()
            .update_status(&order.id, OrderStatus::Failed, PaymentStatus::Failed, now)
            .await?;
        uow.commit().await?;

        Ok(true)
    }
}

struct Shortage {
    product_id: String,
    available: i64,
    requested: i64,
}

/// Takes every item's quantity out of stock, or reports the first shortage.
async fn reduce_stock(uow: &mut UnitOfWork, items: &[OrderItem]) -> ServiceResult<Option<Shortage>> {
    for item in items {
        let exists = uow.products().lock(&item.product_id).await?;
        if exists && uow.products().decrement_stock(&item.product_id, item.qty).await? {
            debug!(product_id = %item.product_id, qty = item.qty, "Stock reduced");
            continue;
        }

        let available = if exists {
            uow.products().stock_of(&item.product_id).await?
        } else {
            0
        };
        return Ok(Some(Shortage {
            product_id: item.product_id.clone(),
            available,
            requested: item.qty,
        }));
    }

    Ok(None)
}

/// Puts every item's quantity back. Deleted products are skipped.
async fn refund_stock(uow: &mut UnitOfWork, items: &[OrderItem]) -> ServiceResult<()> {
    for item in items {
        if !uow.products().lock(&item.product_id).await? {
            warn!(product_id = %item.product_id, "Product gone, stock not returned");
            continue;
        }
        uow.products().increment_stock(&item.product_id, item.qty).await?;
        debug!(product_id = %item.product_id, qty = item.qty, "Stock returned");
    }
    Ok(())
}

/// Logs where the callback payload and the status API disagree.
fn report_disagreement(notification: &Notification, check: &TransactionCheck) {
    if !notification
        .transaction_status
        .eq_ignore_ascii_case(&check.transaction_status)
    {
        warn!(
            order_code = %notification.order_id,
            notified = %notification.transaction_status,
            authoritative = %check.transaction_status,
            "Notification status differs from gateway, using gateway"
        );
    }

    let notified_fraud = notification.fraud_status.as_deref().unwrap_or_default();
    let checked_fraud = check.fraud_status.as_deref().unwrap_or_default();
    if !notified_fraud.eq_ignore_ascii_case(checked_fraud) {
        warn!(
            order_code = %notification.order_id,
            notified = %notified_fraud,
            authoritative = %checked_fraud,
            "Notification fraud status differs from gateway, using gateway"
        );
    }

    let notified_amount = notification.gross_amount.parse::<Money>().ok();
    let checked_amount = check.gross_amount.parse::<Money>().ok();
    if notified_amount.is_some() && checked_amount.is_some() && notified_amount != checked_amount {
        warn!(
            order_code = %notification.order_id,
            notified = %notification.gross_amount,
            authoritative = %check.gross_amount,
            "Notification amount differs from gateway"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
