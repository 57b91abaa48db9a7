//! # storefront-api: Checkout HTTP Service
//!
//! Cart management, checkout and payment reconciliation over HTTP.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront API Server                            │
//! │                                                                         │
//! │  Browser ──► /carts/*      ──► CartService ─────┐                       │
//! │  Browser ──► /checkout/*   ──► CheckoutService ─┼──► storefront-db      │
//! │  Gateway ──► /checkout/notify ► Reconciler ─────┘        (SQLite)       │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                            storefront-gateway ──► Midtrans Snap / API   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment configuration
//! - [`error`] - Service errors and their HTTP mapping
//! - [`handlers`] - Axum handlers and the authenticated-user extractor
//! - [`services`] - Cart, checkout and reconciliation logic
//! - [`sessions`] - Per-user session cart binding and flash messages

pub mod config;
pub mod error;
pub mod handlers;
pub mod services;
pub mod sessions;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use storefront_db::Database;
use storefront_gateway::PaymentGateway;

use crate::config::AppConfig;
use crate::services::{CartService, CheckoutService, Reconciler};
use crate::sessions::SessionStore;

pub use error::{ApiError, ErrorKind, ServiceError, ServiceResult};

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, config: AppConfig) -> Self {
        let sessions = SessionStore::new();
        let carts = CartService::new(db.clone(), config.tax_percent);
        let checkout = CheckoutService::new(
            db.clone(),
            gateway.clone(),
            sessions.clone(),
            config.tax_percent,
            config.app_url.clone(),
        );
        let reconciler = Reconciler::new(
            db.clone(),
            gateway,
            sessions.clone(),
            config.server_key.clone(),
            config.verify_signature,
        );

        AppState {
            db,
            config: Arc::new(config),
            sessions,
            carts,
            checkout,
            reconciler,
        }
    }
}

/// Builds the application router with tracing and per-route deadlines.
pub fn router(state: AppState) -> Router {
    handlers::routes(state.config.request_timeout)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
