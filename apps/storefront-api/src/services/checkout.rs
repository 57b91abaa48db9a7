//! # Checkout Service
//!
//! Turns the user's cart into an order and opens the gateway transaction,
//! all inside one database transaction.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE                                                        │
//! │    user, address, lock cart ─► every product exists ─► refresh cart     │
//! │    build_order                                                          │
//! │    INSERT order (+ retry on order_code collision) ─► INSERT payment     │
//! │    gateway.create_transaction(SnapRequest)                              │
//! │        ├── ok + token ──► UPDATE payment.token ──► COMMIT               │
//! │        └── error ───────► ROLLBACK (no order is left behind)            │
//! │                                                                         │
//! │  Stock is NOT decremented and the cart is NOT cleared here; both wait   │
//! │  for the settlement notification.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use storefront_core::order::{build_order, generate_order_code};
use storefront_core::{
    Address, Cart, CoreError, Order, OrderStatus, PaymentStatus, Product, ShippingSelection,
    TaxRate,
};
use storefront_db::{Database, DbError};
use storefront_gateway::{PaymentGateway, SnapRequest};

use crate::error::{ServiceError, ServiceResult};
use crate::services::cart::{load_catalog, require_user};
use crate::sessions::SessionStore;

/// Attempts at finding a free order code before giving up.
pub const MAX_ORDER_CODE_ATTEMPTS: u32 = 3;

/// What the user confirmed on the checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Explicit cart; falls back to the session's cart, then the user's cart.
    pub cart_id: Option<String>,
    pub address_id: String,
    pub shipping: ShippingSelection,
}

/// A created order with its payment handle.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub token: String,
    pub redirect_url: String,
}

/// Data behind the checkout confirmation page.
#[derive(Debug, Clone)]
pub struct CheckoutSummary {
    pub cart: Cart,
    pub products: HashMap<String, Product>,
    pub addresses: Vec<Address>,
}

/// Order status shown on the payment landing pages.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_code: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub grand_total: String,
    pub grand_total_cents: i64,
    pub shipping_address: String,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        OrderSummary {
            order_code: order.order_code.clone(),
            status: order.status,
            payment_status: order.payment_status,
            grand_total: order.grand_total.to_string(),
            grand_total_cents: order.grand_total.cents(),
            shipping_address: order.shipping_address.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    sessions: SessionStore,
    tax: TaxRate,
    app_url: String,
}

impl CheckoutService {
    pub fn new(
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        sessions: SessionStore,
        tax: TaxRate,
        app_url: impl Into<String>,
    ) -> Self {
        CheckoutService {
            db,
            gateway,
            sessions,
            tax,
            app_url: app_url.into(),
        }
    }

    /// Cart and addresses for the confirmation page.
    ///
    /// Fails with `EmptyCart` when there is nothing to check out.
    pub async fn summary(&self, user_id: &str) -> ServiceResult<CheckoutSummary> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;
        require_user(&mut uow, user_id).await?;

        let mut cart = uow.carts().lock_or_create(user_id, self.tax, now).await?;
        let products = load_catalog(&mut uow, &cart, None).await?;
        if cart.refresh(&products, self.tax, now) {
            uow.carts().save(&cart).await?;
        }

        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let addresses = uow.users().list_addresses(user_id).await?;
        uow.commit().await?;

        Ok(CheckoutSummary {
            cart,
            products,
            addresses,
        })
    }

    /// Creates the order and the gateway transaction.
    pub async fn initiate(
        &self,
        user_id: &str,
        request: CheckoutRequest,
    ) -> ServiceResult<CheckoutOutcome> {
        let now = Utc::now();
        let mut uow = self.db.begin().await?;

        let user = require_user(&mut uow, user_id).await?;
        let address = uow
            .users()
            .get_address(&request.address_id)
            .await?
            .ok_or_else(|| DbError::not_found("Address", &request.address_id))?;

        let cart_id = request
            .cart_id
            .clone()
            .or_else(|| self.sessions.cart_binding(user_id));
        let mut cart = match cart_id {
            Some(id) => uow
                .carts()
                .lock_by_id(&id)
                .await?
                .ok_or_else(|| DbError::not_found("Cart", &id))?,
            None => uow.carts().lock_or_create(user_id, self.tax, now).await?,
        };

        // a foreign cart is never re-projected or saved
        if cart.user_id != user.id {
            return Err(CoreError::CartNotOwned(cart.id.clone()).into());
        }

        let catalog = load_catalog(&mut uow, &cart, None).await?;

        // refresh() prunes lines whose product is gone; the user confirmed
        // those lines, so their disappearance aborts the checkout instead
        if let Some(line) = cart
            .items
            .iter()
            .find(|line| !catalog.contains_key(&line.product_id))
        {
            warn!(
                cart_id = %cart.id,
                product_id = %line.product_id,
                "Cart line refers to a deleted product"
            );
            return Err(CoreError::out_of_stock(&line.product_id, 0, line.qty).into());
        }

        if cart.refresh(&catalog, self.tax, now) {
            debug!(cart_id = %cart.id, "Cart re-projected before checkout");
            uow.carts().save(&cart).await?;
        }

        let mut draft = build_order(
            &user,
            &address,
            &cart,
            &catalog,
            &request.shipping,
            self.tax,
            now,
        )?;

        let mut attempt = 1;
        loop {
            match uow.orders().insert(&draft).await {
                Ok(()) => break,
                Err(err)
                    if err.is_unique_violation_on("orders.order_code")
                        && attempt < MAX_ORDER_CODE_ATTEMPTS =>
                {
                    warn!(
                        order_code = %draft.order.order_code,
                        attempt = attempt,
                        "Order code collision, regenerating"
                    );
                    attempt += 1;
                    draft = draft.with_order_code(generate_order_code(now));
                }
                Err(err) => return Err(err.into()),
            }
        }
        uow.payments().insert(&draft.payment).await?;

        let snap = SnapRequest::for_order(&draft.order, &draft.items, &draft.customer, &self.app_url);
        debug!(
            order_code = %draft.order.order_code,
            gross_amount = snap.transaction_details.gross_amount,
            lines = snap.item_details.len(),
            "Requesting payment token"
        );

        let response = self
            .gateway
            .create_transaction(&snap)
            .await
            .map_err(ServiceError::order_create_failed)?;

        if response.token.trim().is_empty() || response.redirect_url.trim().is_empty() {
            return Err(ServiceError::OrderCreateFailed {
                message: "gateway returned an empty token or redirect URL".to_string(),
                retryable: false,
            });
        }

        uow.payments()
            .set_token(&draft.payment.id, &response.token, now)
            .await?;
        uow.commit().await?;

        info!(
            order_code = %draft.order.order_code,
            user_id = %user_id,
            grand_total = %draft.order.grand_total,
            items = draft.items.len(),
            "Order created"
        );

        Ok(CheckoutOutcome {
            order: draft.order,
            token: response.token,
            redirect_url: response.redirect_url,
        })
    }

    /// Order summary for the payment landing pages, owner only.
    pub async fn order_summary(&self, user_id: &str, order_code: &str) -> ServiceResult<OrderSummary> {
        let mut uow = self.db.begin_read().await?;
        let order = uow
            .orders()
            .find_by_code(order_code)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_code))?;
        uow.rollback().await?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(format!(
                "order {} belongs to another user",
                order_code
            )));
        }

        Ok(OrderSummary::from(&order))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::services::cart::CartService;
    use crate::test_support::{
        file_db, seed_product, seed_user, shipping, test_db, ScriptedGateway,
    };
    use storefront_core::{Money, DEFAULT_TAX_RATE};
    use storefront_gateway::snap::{ADJUSTMENT_ITEM_ID, SHIPPING_ITEM_ID};

    fn service(db: &Database, gateway: Arc<ScriptedGateway>) -> CheckoutService {
        CheckoutService::new(
            db.clone(),
            gateway,
            SessionStore::new(),
            DEFAULT_TAX_RATE,
            "http://localhost:8080",
        )
    }

    #[tokio::test]
    async fn test_single_item_checkout() {
        let db = test_db().await;
        let (user, address) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 100_000, 5).await;
        CartService::new(db.clone(), DEFAULT_TAX_RATE)
            .add_item(&user.id, &product.id, 2)
            .await
            .unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        let outcome = service(&db, gateway.clone())
            .initiate(&user.id, request(&address.id, 15_000))
            .await
            .unwrap();

        assert_eq!(outcome.order.grand_total, Money::from_units(239_000));
        assert_eq!(outcome.order.status, OrderStatus::Pending);
        assert_eq!(outcome.order.payment_status, PaymentStatus::Pending);
        assert!(!outcome.token.is_empty());

        let sent = gateway.snap_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].transaction_details.gross_amount, 239_000);
        assert_eq!(sent[0].transaction_details.order_id, outcome.order.order_code);
        assert!(sent[0].item_details.iter().any(|l| l.id == SHIPPING_ITEM_ID));
        assert!(sent[0].callbacks.finish.ends_with(&outcome.order.order_code));

        let mut uow = db.begin().await.unwrap();
        let payment = uow
            .payments()
            .find_by_order(&outcome.order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.amount, outcome.order.grand_total);
        assert_eq!(payment.token.as_deref(), Some(outcome.token.as_str()));

        // stock untouched, cart intact until settlement
        assert_eq!(uow.products().stock_of(&product.id).await.unwrap(), 5);
        let cart = uow.carts().fetch_by_user(&user.id).await.unwrap().unwrap();
        assert_eq!(cart.total_items, 2);
    }

    #[tokio::test]
    async fn test_rounding_adjustment_line_sent() {
        let db = test_db().await;
        let (user, address) = seed_user(&db, "u1").await;
        // each line rounds 33.605,60 up to 33.606; the order total rounds down
        let a = seed_product(&db, "a", 30_005, 5).await;
        let b = seed_product(&db, "b", 30_005, 5).await;
        let carts = CartService::new(db.clone(), DEFAULT_TAX_RATE);
        carts.add_item(&user.id, &a.id, 1).await.unwrap();
        carts.add_item(&user.id, &b.id, 1).await.unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        let outcome = service(&db, gateway.clone())
            .initiate(&user.id, request(&address.id, 0))
            .await
            .unwrap();
        assert_eq!(outcome.order.grand_total, Money::from_cents(6_721_120));

        let sent = gateway.snap_requests()[0].clone();
        assert_eq!(sent.transaction_details.gross_amount, 67_211);
        let adjustment = sent
            .item_details
            .iter()
            .find(|l| l.id == ADJUSTMENT_ITEM_ID)
            .unwrap();
        assert_eq!(adjustment.price, -1);
        assert_eq!(sent.items_total(), 67_211);
    }

    #[tokio::test]
    async fn test_gateway_failure_rolls_back_order() {
        let db = test_db().await;
        let (user, address) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 50_000, 5).await;
        CartService::new(db.clone(), DEFAULT_TAX_RATE)
            .add_item(&user.id, &product.id, 1)
            .await
            .unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        gateway.reject_snap();
        let err = service(&db, gateway.clone())
            .initiate(&user.id, request(&address.id, 10_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OrderCreateFailed);

        let code = gateway.snap_requests()[0].transaction_details.order_id.clone();
        let mut uow = db.begin().await.unwrap();
        assert!(uow.orders().find_by_code(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_token_rolls_back_order() {
        let db = test_db().await;
        let (user, address) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 50_000, 5).await;
        CartService::new(db.clone(), DEFAULT_TAX_RATE)
            .add_item(&user.id, &product.id, 1)
            .await
            .unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        gateway.return_empty_token();
        let err = service(&db, gateway.clone())
            .initiate(&user.id, request(&address.id, 10_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OrderCreateFailed);

        let code = gateway.snap_requests()[0].transaction_details.order_id.clone();
        let mut uow = db.begin().await.unwrap();
        assert!(uow.orders().find_by_code(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_out_of_stock_aborts_checkout() {
        let db = test_db().await;
        let (user, address) = seed_user(&db, "u1").await;
        let product = seed_product(&db, "p1", 50_000, 2).await;
        CartService::new(db.clone(), DEFAULT_TAX_RATE)
            .add_item(&user.id, &product.id, 2)
            .await
            .unwrap();

        // another order settled in between
        let mut uow = db.begin().await.unwrap();
        assert!(uow.products().decrement_stock(&product.id, 1).await.unwrap());
        uow.commit().await.unwrap();

        let before = order_rows(&db).await;
        let gateway = Arc::new(ScriptedGateway::new());
        let err = service(&db, gateway.clone())
            .initiate(&user.id, request(&address.id, 10_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfStock);
        assert!(gateway.snap_requests().is_empty());

        // nothing of the order survives and the cart is as the user left it
        assert_eq!(order_rows(&db).await, before);
        assert_eq!(before, (0, 0, 0, 0));
        let mut uow = db.begin().await.unwrap();
        let cart = uow.carts().fetch_by_user(&user.id).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].qty, 2);
        assert_eq!(cart.total_items, 2);
        assert_eq!(uow.products().stock_of(&product.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleted_product_aborts_checkout() {
        let db = test_db().await;
        let (user, address) = seed_user(&db, "u1").await;
        let a = seed_product(&db, "a", 100_000, 5).await;
        let b = seed_product(&db, "b", 50_000, 5).await;
        let carts = CartService::new(db.clone(), DEFAULT_TAX_RATE);
        carts.add_item(&user.id, &a.id, 1).await.unwrap();
        carts.add_item(&user.id, &b.id, 1).await.unwrap();

        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(&b.id)
            .execute(db.pool())
            .await
            .unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        let err = service(&db, gateway.clone())
            .initiate(&user.id, request(&address.id, 10_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfStock);
        assert!(gateway.snap_requests().is_empty());
        assert_eq!(order_rows(&db).await, (0, 0, 0, 0));

        // the pruning refresh was rolled back with everything else
        let mut uow = db.begin().await.unwrap();
        let cart = uow.carts().fetch_by_user(&user.id).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.grand_total, Money::from_units(168_000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_checkouts_across_users() {
        let (_dir, db) = file_db(4).await;
        let product = seed_product(&db, "p1", 25_000, 1_000).await;
        let carts = CartService::new(db.clone(), DEFAULT_TAX_RATE);
        let mut users = Vec::new();
        for n in 0..8 {
            let (user, address) = seed_user(&db, &format!("u{n}")).await;
            carts.add_item(&user.id, &product.id, 2).await.unwrap();
            users.push((user, address));
        }

        let gateway = Arc::new(ScriptedGateway::new());
        let checkout = service(&db, gateway.clone());
        let mut tasks = tokio::task::JoinSet::new();
        for (user, address) in &users {
            let checkout = checkout.clone();
            let user_id = user.id.clone();
            let req = request(&address.id, 10_000);
            // the same user's cart keeps changing while the others check out
            let carts = carts.clone();
            let product_id = product.id.clone();
            tasks.spawn(async move {
                let order = checkout.initiate(&user_id, req).await?;
                carts.add_item(&user_id, &product_id, 1).await?;
                Ok::<_, ServiceError>(order.order.grand_total)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let total = joined.unwrap().unwrap();
            assert_eq!(total, Money::from_units(66_000));
        }
        assert_eq!(gateway.snap_requests().len(), 8);
        assert_eq!(order_rows(&db).await, (8, 8, 8, 8));
    }

    #[tokio::test]
    async fn test_foreign_address_and_empty_cart() {
        let db = test_db().await;
        let (user, address) = seed_user(&db, "u1").await;
        let (_, other_address) = seed_user(&db, "u2").await;
        let gateway = Arc::new(ScriptedGateway::new());
        let checkout = service(&db, gateway.clone());

        let err = checkout
            .initiate(&user.id, request(&other_address.id, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = checkout
            .initiate(&user.id, request(&address.id, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::EmptyCart)));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(gateway.snap_requests().is_empty());
    }

    #[tokio::test]
    async fn test_summary_and_landing() {
        let db = test_db().await;
        let (user, address) = seed_user(&db, "u1").await;
        let (stranger, _) = seed_user(&db, "u2").await;
        let product = seed_product(&db, "p1", 100_000, 5).await;
        let gateway = Arc::new(ScriptedGateway::new());
        let checkout = service(&db, gateway);

        let err = checkout.summary(&user.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        CartService::new(db.clone(), DEFAULT_TAX_RATE)
            .add_item(&user.id, &product.id, 2)
            .await
            .unwrap();
        let summary = checkout.summary(&user.id).await.unwrap();
        assert_eq!(summary.addresses.len(), 1);
        assert_eq!(summary.cart.grand_total, Money::from_units(224_000));

        let outcome = checkout
            .initiate(&user.id, request(&address.id, 15_000))
            .await
            .unwrap();
        let landing = checkout
            .order_summary(&user.id, &outcome.order.order_code)
            .await
            .unwrap();
        assert_eq!(landing.grand_total, "Rp239.000");
        assert_eq!(landing.status, OrderStatus::Pending);

        let err = checkout
            .order_summary(&stranger.id, &outcome.order.order_code)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    /// `(orders, order_items, order_customers, payments)` row counts.
    async fn order_rows(db: &Database) -> (i64, i64, i64, i64) {
        let mut counts = [0i64; 4];
        for (count, table) in counts
            .iter_mut()
            .zip(["orders", "order_items", "order_customers", "payments"])
        {
            *count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(db.pool())
                .await
                .unwrap();
        }
        (counts[0], counts[1], counts[2], counts[3])
    }

    fn request(address_id: &str, shipping_units: i64) -> CheckoutRequest {
        CheckoutRequest {
            cart_id: None,
            address_id: address_id.to_string(),
            shipping: shipping(shipping_units),
        }
    }
}
