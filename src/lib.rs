//! Cancer-center office locator — library crate exposing shared types,
//! the router builder, and the refresh/matching pipeline modules.

pub mod config;
pub mod csv_import;
pub mod error;
pub mod geo;
pub mod http_retry;
pub mod matcher;
pub mod middleware;
pub mod models;
pub mod normalize;
pub mod overpass;
pub mod refresh;
pub mod repo;
pub mod routes;
pub mod scheduler;
pub mod wikidata;

pub use config::{Config, ConfigError};
pub use error::AppError;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Shared application state injected into every handler via Axum `State`.
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub http_client: reqwest::Client,
}

/// Opens (creating if absent) the SQLite database at `config.db_path` with
/// WAL mode and foreign keys enabled.
pub async fn create_pool(config: &Config) -> anyhow::Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::new()
        .filename(&config.db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await?;

    Ok(pool)
}

/// Builds the full application router with all routes and middleware,
/// alongside the shared state handle (used by `main.rs` to spawn the
/// background scheduler against the same pool/config/client).
pub fn create_app(pool: SqlitePool, config: Config) -> (Router, Arc<AppState>) {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("reqwest client must build with static configuration");

    let cors = build_cors(&config);
    let body_limit = config.max_csv_upload_bytes;

    let state = Arc::new(AppState {
        pool,
        config,
        http_client,
    });

    let router = Router::new()
        .nest("/api", routes::api_routes(body_limit))
        .fallback(not_found)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state.clone());

    (router, state)
}

/// Catch-all for unmapped routes: JSON 404 instead of axum's default
/// plain-text body.
async fn not_found() -> AppError {
    AppError::NotFound("route not found".to_owned())
}

/// Builds a CORS layer honoring the configured origin and the route
/// table's `GET, POST, OPTIONS` method set.
fn build_cors(config: &Config) -> CorsLayer {
    let origin = if config.cors_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let explicit: Vec<HeaderValue> = config
            .cors_origin
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        AllowOrigin::list(explicit)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}
