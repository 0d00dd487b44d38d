pub mod admin;
pub mod centers;
pub mod health;
pub mod offices;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::AppState;

/// Builds the API router mounted at `/api`. `body_limit` is applied as a
/// per-route override on the two CSV upload endpoints, on top of the
/// global body-limit layer already applied around the whole app.
pub fn api_routes(body_limit: usize) -> Router<Arc<AppState>> {
    let admin = admin::router().layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .merge(health::router())
        .merge(centers::router())
        .merge(offices::router())
        .merge(admin)
}
