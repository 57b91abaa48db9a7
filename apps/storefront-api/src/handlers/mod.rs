//! HTTP handlers.
//!
//! ```text
//! GET  /health                    health::check
//! GET  /carts                     cart::show
//! POST /carts/add                 cart::add          ─► 303 /carts
//! POST /carts/update              cart::update       ─► 303 /carts
//! POST /carts/delete              cart::delete       ─► 303 /carts
//! GET  /checkout                  checkout::show
//! POST /checkout/initiate         checkout::initiate
//! POST /checkout/notify           checkout::notify   (gateway, unauthenticated)
//! GET  /checkout/finish           checkout::finish
//! GET  /checkout/unfinish         checkout::unfinish
//! GET  /checkout/error            checkout::error
//! ```

pub mod cart;
pub mod checkout;
pub mod health;

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the user id resolved by the session layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Route table. Every request runs under `request_timeout`; a browser that
/// hits it gets 408, the gateway callback gets 503 so it is redelivered.
pub fn routes(request_timeout: Duration) -> Router<AppState> {
    let carts = Router::new()
        .route("/carts", get(cart::show))
        .route("/carts/add", post(cart::add))
        .route("/carts/update", post(cart::update))
        .route("/carts/delete", post(cart::delete));

    let checkout = Router::new()
        .route("/checkout", get(checkout::show))
        .route("/checkout/initiate", post(checkout::initiate))
        .route("/checkout/finish", get(checkout::finish))
        .route("/checkout/unfinish", get(checkout::unfinish))
        .route("/checkout/error", get(checkout::error));

    let pages = Router::new()
        .route("/health", get(health::check))
        .merge(carts)
        .merge(checkout)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ));

    // Gateway callback (signature-verified, raw body)
    let notify = Router::new()
        .route("/checkout/notify", post(checkout::notify))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::SERVICE_UNAVAILABLE,
            request_timeout,
        ));

    pages.merge(notify)
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                tracing::warn!(uri = %parts.uri, "Request without authenticated user");
                ApiError::unauthorized("Login required")
            })?;

        let user = CurrentUser { id: id.to_string() };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
