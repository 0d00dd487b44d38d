use std::env;

/// Typed application configuration loaded from environment variables.
/// Only `ADMIN_TOKEN` is required at startup; everything else has a
/// default matching the system's environment surface.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub db_path: String,
    pub cors_origin: String,
    pub admin_token: String,

    pub overpass_urls: Vec<String>,
    pub default_radius_m: i64,
    pub batch_centers_per_run: i64,
    pub overpass_throttle_ms: u64,
    pub refresh_center_retry_count: u32,
    pub refresh_center_retry_delay_ms: u64,
    pub stale_link_days: i64,
    pub refresh_health_max_age_minutes: i64,
    pub scheduled_refresh_interval_secs: u64,

    pub wikidata_api_url: String,
    pub wikidata_enrich_enabled: bool,
    pub wikidata_enrich_max_ids_per_center: i64,
    pub wikidata_enrich_stale_days: i64,
    pub wikidata_enrich_throttle_ms: u64,

    pub max_csv_upload_bytes: usize,
}

impl Config {
    /// Build config from environment variables.
    /// Returns a descriptive error for each missing/invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_env("PORT", "8080")?,
            db_path: env::var("DB_PATH").unwrap_or_else(|_| "./data/centers.db".to_owned()),
            cors_origin: env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_owned()),
            admin_token: require_env("ADMIN_TOKEN")?,

            overpass_urls: env::var("OVERPASS_URL")
                .unwrap_or_else(|_| "https://overpass-api.de/api/interpreter".to_owned())
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect(),
            default_radius_m: parse_env("DEFAULT_RADIUS_M", "100000")?,
            batch_centers_per_run: parse_env::<i64>("BATCH_CENTERS_PER_RUN", "10")?.clamp(1, 200),
            overpass_throttle_ms: parse_env::<u64>("OVERPASS_THROTTLE_MS", "1200")?.min(15_000),
            refresh_center_retry_count: parse_env("REFRESH_CENTER_RETRY_COUNT", "3")?,
            refresh_center_retry_delay_ms: parse_env::<u64>("REFRESH_CENTER_RETRY_DELAY_MS", "2000")?
                .min(60_000),
            stale_link_days: parse_env("STALE_LINK_DAYS", "30")?,
            refresh_health_max_age_minutes: parse_env("REFRESH_HEALTH_MAX_AGE_MINUTES", "130")?,
            scheduled_refresh_interval_secs: parse_env(
                "SCHEDULED_REFRESH_INTERVAL_SECS",
                "3600",
            )?,

            wikidata_api_url: env::var("WIKIDATA_API_URL")
                .unwrap_or_else(|_| "https://www.wikidata.org/w/api.php".to_owned()),
            wikidata_enrich_enabled: parse_env("WIKIDATA_ENRICH_ENABLED", "true")?,
            wikidata_enrich_max_ids_per_center: parse_env(
                "WIKIDATA_ENRICH_MAX_IDS_PER_CENTER",
                "30",
            )?,
            wikidata_enrich_stale_days: parse_env("WIKIDATA_ENRICH_STALE_DAYS", "14")?,
            wikidata_enrich_throttle_ms: parse_env("WIKIDATA_ENRICH_THROTTLE_MS", "250")?,

            max_csv_upload_bytes: parse_env::<usize>("MAX_CSV_UPLOAD_BYTES", "5242880")?,
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {var}: {source}")]
    InvalidValue {
        var: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVar(key.to_owned()))
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_owned());
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var: key.to_owned(),
        source: Box::new(e),
    })
}
