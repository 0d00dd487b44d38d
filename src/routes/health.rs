use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::AppState;

/// Only `/health` is part of the public route table. Readiness is a
/// startup gate the scheduler's caller runs once against the pool
/// directly (see [`check_ready`]), not a routed endpoint.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(liveness))
}

/// `GET /health` -- liveness probe.
/// Returns 200 if the process is running. No dependency check.
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "alive" })))
}

/// Startup readiness gate: confirms the database is reachable before the
/// scheduler's first tick. Not exposed over HTTP.
pub async fn check_ready(pool: &SqlitePool) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed: database unreachable");
            false
        }
    }
}
