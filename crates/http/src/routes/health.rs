//! Health check handler

use crate::state::AppState;
use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde_json::json;
use tracing::instrument;

pub const SERVICE_NAME: &str = "intela-web";

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// Liveness probe; does not touch the upstream APIs
#[instrument(name = "health_check")]
pub async fn health_handler() -> Response {
    let health_status = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    });

    (StatusCode::OK, Json(health_status)).into_response()
}
