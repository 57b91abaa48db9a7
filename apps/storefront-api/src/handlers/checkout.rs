//! Checkout API Handlers
//!
//! ```text
//! GET  /checkout            confirmation view   | empty cart ─► 303 /carts
//! POST /checkout/initiate   JSON or form        ─► {success, token, order_id, redirect_url}
//! POST /checkout/notify     raw gateway body    ─► 200 OK | 400 | 500 (gateway retries)
//! GET  /checkout/{finish,unfinish,error}?order_id=
//!                           order summary       | unknown/foreign ─► 303 /carts
//! ```

use axum::body::Bytes;
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use storefront_core::{Address, CoreError, Money, ShippingSelection, ValidationError};

use crate::error::{ApiError, ErrorKind, ServiceError, ServiceResult};
use crate::handlers::cart::{CartView, CART_PATH};
use crate::handlers::CurrentUser;
use crate::services::{CheckoutRequest, OrderSummary};
use crate::sessions::Flash;
use crate::AppState;

// =============================================================================
// Confirmation Page
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutView {
    pub cart: CartView,
    pub addresses: Vec<Address>,
}

/// GET /checkout
pub async fn show(State(state): State<AppState>, user: CurrentUser) -> Response {
    match state.checkout.summary(&user.id).await {
        Ok(summary) => {
            state.sessions.bind_cart(&user.id, &summary.cart.id);
            let flashes = state.sessions.take_flashes(&user.id);
            Json(CheckoutView {
                cart: CartView::new(&summary.cart, &summary.products, flashes),
                addresses: summary.addresses,
            })
            .into_response()
        }
        Err(ServiceError::Core(CoreError::EmptyCart)) => {
            state
                .sessions
                .push_flash(&user.id, Flash::error("Your cart is empty"));
            Redirect::to(CART_PATH).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

// =============================================================================
// Initiate
// =============================================================================

/// Shipping cost as sent by the page: a JSON number or a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CostInput {
    Number(serde_json::Number),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateForm {
    #[serde(default)]
    pub address_id: String,
    #[serde(default)]
    pub shipping_service_code: String,
    #[serde(default)]
    pub shipping_service_name: String,
    pub shipping_cost: Option<CostInput>,
    pub cart_id: Option<String>,
}

impl InitiateForm {
    fn into_request(self) -> ServiceResult<CheckoutRequest> {
        let address_id = self.address_id.trim().to_string();
        if address_id.is_empty() {
            return Err(required("address_id"));
        }

        let raw_cost = match self.shipping_cost {
            Some(CostInput::Number(n)) => n.to_string(),
            Some(CostInput::Text(s)) => s.trim().to_string(),
            None => return Err(required("shipping_cost")),
        };
        let cost = raw_cost.parse::<Money>().map_err(|_| {
            ServiceError::from(CoreError::from(ValidationError::InvalidFormat {
                field: "shipping_cost".to_string(),
                reason: format!("'{raw_cost}' is not an amount"),
            }))
        })?;

        Ok(CheckoutRequest {
            cart_id: self
                .cart_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            address_id,
            shipping: ShippingSelection {
                service_code: self.shipping_service_code.trim().to_string(),
                service_name: self.shipping_service_name.trim().to_string(),
                cost,
            },
        })
    }
}

fn required(field: &str) -> ServiceError {
    CoreError::from(ValidationError::Required {
        field: field.to_string(),
    })
    .into()
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiateResponse {
    pub success: bool,
    pub token: String,
    pub order_id: String,
    pub redirect_url: String,
}

/// POST /checkout/initiate
pub async fn initiate(
    State(state): State<AppState>,
    user: CurrentUser,
    request: Request,
) -> Result<Json<InitiateResponse>, ApiError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let form = if is_json {
        Json::<InitiateForm>::from_request(request, &state)
            .await
            .map(|Json(form)| form)
            .map_err(|rejection| ApiError::new(ErrorKind::Validation, rejection.body_text()))?
    } else {
        Form::<InitiateForm>::from_request(request, &state)
            .await
            .map(|Form(form)| form)
            .map_err(|rejection| ApiError::new(ErrorKind::Validation, rejection.body_text()))?
    };

    let outcome = state
        .checkout
        .initiate(&user.id, form.into_request()?)
        .await?;

    Ok(Json(InitiateResponse {
        success: true,
        token: outcome.token,
        order_id: outcome.order.order_code,
        redirect_url: outcome.redirect_url,
    }))
}

// =============================================================================
// Gateway Notification
// =============================================================================

/// POST /checkout/notify
///
/// Must receive the raw body for signature verification.
pub async fn notify(State(state): State<AppState>, body: Bytes) -> (StatusCode, String) {
    match state.reconciler.handle(&body).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Notification acknowledged");
            (StatusCode::OK, "OK".to_string())
        }
        Err(err) if err.kind() == ErrorKind::Validation => {
            tracing::warn!(error = %err, "Rejected notification");
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => {
            tracing::error!(error = %err, "Notification processing failed, gateway will retry");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Notification could not be processed".to_string(),
            )
        }
    }
}

// =============================================================================
// Landing Pages
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LandingQuery {
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LandingView {
    pub outcome: &'static str,
    pub order: OrderSummary,
}

/// GET /checkout/finish
pub async fn finish(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<LandingQuery>,
) -> Response {
    landing(&state, &user, query, "finish").await
}

/// GET /checkout/unfinish
pub async fn unfinish(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<LandingQuery>,
) -> Response {
    landing(&state, &user, query, "unfinish").await
}

/// GET /checkout/error
pub async fn error(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<LandingQuery>,
) -> Response {
    landing(&state, &user, query, "error").await
}

async fn landing(
    state: &AppState,
    user: &CurrentUser,
    query: LandingQuery,
    outcome: &'static str,
) -> Response {
    let Some(order_code) = query.order_id.filter(|id| !id.trim().is_empty()) else {
        return Redirect::to(CART_PATH).into_response();
    };

    match state.checkout.order_summary(&user.id, order_code.trim()).await {
        Ok(order) => Json(LandingView { outcome, order }).into_response(),
        Err(err) => {
            let api = ApiError::from(err);
            tracing::warn!(user_id = %user.id, order_code = %order_code, code = ?api.code, "Landing page refused");
            state.sessions.push_flash(&user.id, Flash::error(api.message));
            Redirect::to(CART_PATH).into_response()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
