use std::sync::Arc;

use centerwatch_api::{AppState, Config};
use rand::Rng;
use sqlx::SqlitePool;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Builds a fresh on-disk SQLite database (migrated) plus a [`Config`]
/// suitable for `create_app`. Each call gets its own file so tests can
/// run concurrently without interfering.
pub async fn test_config() -> (SqlitePool, Config) {
    let suffix: u64 = rand::thread_rng().gen();
    let db_path = std::env::temp_dir().join(format!("centerwatch_test_{suffix}.db"));

    let config = Config {
        port: 0,
        db_path: db_path.to_string_lossy().into_owned(),
        cors_origin: "*".to_owned(),
        admin_token: ADMIN_TOKEN.to_owned(),

        overpass_urls: vec!["https://overpass.invalid/api/interpreter".to_owned()],
        default_radius_m: 100_000,
        batch_centers_per_run: 10,
        overpass_throttle_ms: 0,
        refresh_center_retry_count: 1,
        refresh_center_retry_delay_ms: 0,
        stale_link_days: 30,
        refresh_health_max_age_minutes: 130,
        scheduled_refresh_interval_secs: 3_600,

        wikidata_api_url: "https://wikidata.invalid/w/api.php".to_owned(),
        wikidata_enrich_enabled: false,
        wikidata_enrich_max_ids_per_center: 30,
        wikidata_enrich_stale_days: 14,
        wikidata_enrich_throttle_ms: 0,

        max_csv_upload_bytes: 5_242_880,
    };

    let pool = centerwatch_api::create_pool(&config)
        .await
        .expect("test database must open");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("test migrations must apply");

    (pool, config)
}

pub fn build_app(pool: SqlitePool, config: Config) -> (axum::Router, Arc<AppState>) {
    centerwatch_api::create_app(pool, config)
}
