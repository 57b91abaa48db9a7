//! Health check endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::AppState;

pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = state.db.health_check().await;
    let (status, label) = if db_ok {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!("Health check failed: database unreachable");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(serde_json::json!({
            "status": label,
            "service": "storefront-api",
            "version": env!("CARGO_PKG_VERSION"),
            "db": db_ok,
        })),
    )
}
