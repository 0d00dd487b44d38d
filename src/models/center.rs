use chrono::{DateTime, Utc};
use serde::Serialize;

/// Full `centers` row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Center {
    pub id: i64,
    pub center_code: String,
    pub name: String,
    pub tier: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub country: Option<String>,
    pub region: Option<String>,
    pub source_url: Option<String>,
    pub is_active: bool,
    pub last_csv_sync_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public listing projection, `GET /api/centers`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CenterListItem {
    pub id: i64,
    pub center_code: String,
    pub name: String,
    pub tier: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub country: Option<String>,
    pub region: Option<String>,
}
