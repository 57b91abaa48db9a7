//! # API Error Type
//!
//! Services return [`ServiceError`]; the HTTP layer turns it into an
//! [`ApiError`] through its [`ErrorKind`].
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CoreError ─────┐                                                       │
//! │  DbError ───────┼──► ServiceError ──kind()──► ErrorKind ──► ApiError    │
//! │  GatewayError ──┘         │                       │            │        │
//! │                           │                  HTTP status   JSON body    │
//! │   OrderCreateFailed ──────┤                                             │
//! │   Unauthorized ───────────┤   {"success": false,                        │
//! │   Forbidden ──────────────┘    "code": "OUT_OF_STOCK",                  │
//! │                                "message": "..."}                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! INTERNAL errors are logged here and replaced by a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use storefront_core::CoreError;
use storefront_db::DbError;
use storefront_gateway::GatewayError;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Service Error
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The gateway did not hand back a usable transaction; nothing was kept.
    #[error("Order could not be created: {message}")]
    OrderCreateFailed { message: String, retryable: bool },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl ServiceError {
    pub fn order_create_failed(err: GatewayError) -> Self {
        ServiceError::OrderCreateFailed {
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Core(err) => match err {
                CoreError::ProductNotFound(_) => ErrorKind::NotFound,
                CoreError::OutOfStock { .. } => ErrorKind::OutOfStock,
                CoreError::CartNotOwned(_) | CoreError::AddressNotOwned(_) => {
                    ErrorKind::Forbidden
                }
                CoreError::EmptyCart
                | CoreError::QuantityTooLarge { .. }
                | CoreError::Validation(_) => ErrorKind::Validation,
            },
            ServiceError::Db(err) => match err {
                DbError::NotFound { .. } => ErrorKind::NotFound,
                DbError::UniqueViolation { .. } => ErrorKind::Conflict,
                DbError::CheckViolation(message) if message.contains("stock") => {
                    ErrorKind::OutOfStock
                }
                DbError::CheckViolation(_) | DbError::ForeignKeyViolation { .. } => {
                    ErrorKind::Validation
                }
                _ => ErrorKind::Internal,
            },
            ServiceError::Gateway(err) => match err {
                GatewayError::Transient(_) => ErrorKind::GatewayTransient,
                GatewayError::Rejected { .. } | GatewayError::InvalidResponse(_) => {
                    ErrorKind::GatewayPermanent
                }
                GatewayError::UnknownOrder(_) => ErrorKind::NotFound,
                GatewayError::InvalidSignature(_) | GatewayError::MalformedNotification(_) => {
                    ErrorKind::Validation
                }
                GatewayError::Config(_) => ErrorKind::Internal,
            },
            ServiceError::OrderCreateFailed { retryable: true, .. } => {
                ErrorKind::GatewayTransient
            }
            ServiceError::OrderCreateFailed { .. } => ErrorKind::OrderCreateFailed,
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }
}

// =============================================================================
// Error Kinds
// =============================================================================

/// Error classification shared by every endpoint.
///
/// ## Usage in Frontend
/// ```typescript
/// const res = await fetch('/checkout/initiate', { method: 'POST', body });
/// const data = await res.json();
/// if (!data.success && data.code === 'OUT_OF_STOCK') {
///   showCart(data.message);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Form fields missing or ill-formed (400)
    Validation,

    /// Entity absent (404)
    NotFound,

    /// No authenticated user (401)
    Unauthorized,

    /// Address, cart or order belongs to someone else (403)
    Forbidden,

    /// Not enough stock; never retried automatically (409)
    OutOfStock,

    /// Gateway 5xx or timeout (503)
    GatewayTransient,

    /// Gateway 4xx or unusable response (502)
    GatewayPermanent,

    /// Checkout rolled back because the gateway refused the order (502)
    OrderCreateFailed,

    /// Duplicate write (409)
    Conflict,

    /// Unexpected database or IO failure (500)
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::OutOfStock | ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::GatewayTransient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::GatewayPermanent | ErrorKind::OrderCreateFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// API Error
// =============================================================================

/// Error body returned to HTTP clients.
///
/// ```json
/// { "success": false, "code": "OUT_OF_STOCK", "message": "Insufficient stock for Kopi Gayo: 1 left, 2 wanted" }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub code: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            success: false,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorKind::Unauthorized, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.kind();
        match code {
            ErrorKind::Internal => {
                tracing::error!(error = %err, "Internal error");
                ApiError::new(code, "Internal server error")
            }
            ErrorKind::GatewayPermanent | ErrorKind::OrderCreateFailed => {
                tracing::error!(error = %err, "Payment gateway failure");
                ApiError::new(code, err.to_string())
            }
            _ => ApiError::new(code, err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
