//! CenterWatch API — local development entry point.

use std::net::SocketAddr;

use centerwatch_api::config::Config;

#[tokio::main]
async fn main() {
    // Load .env in development; silently skip if missing (prod uses real env vars)
    let _ = dotenvy::dotenv();

    // Initialize structured logging from RUST_LOG env var (defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "centerwatch_api=info,tower_http=info".into()),
        )
        .json()
        .init();

    // Load typed config
    // SAFETY: Application cannot start without valid configuration; crashing is the correct behavior.
    let config = Config::from_env().expect("Failed to load configuration from environment");

    let port = config.port;

    let pool = centerwatch_api::create_pool(&config)
        .await
        // SAFETY: Application cannot serve requests without a database connection; crashing is correct.
        .expect("Failed to open database");

    tracing::info!(db_path = %config.db_path, "Database pool established");

    // Run pending migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        // SAFETY: Running with an outdated schema would cause runtime errors; crashing ensures integrity.
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations applied");

    // SAFETY: the scheduler's first tick assumes a reachable database; fail fast instead.
    if !centerwatch_api::routes::health::check_ready(&pool).await {
        panic!("Database is not ready to accept queries");
    }

    // Build the full application router and shared state
    let (app, state) = centerwatch_api::create_app(pool, config);

    centerwatch_api::scheduler::spawn(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting CenterWatch API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        // SAFETY: If the port is unavailable, the server cannot accept connections; must fail loudly.
        .expect("Failed to bind TCP listener");

    axum::serve(listener, app)
        .await
        // SAFETY: Fatal server error (e.g. panic in Hyper); crashing is the only option.
        .expect("Server error");
}
