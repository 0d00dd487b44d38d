use serde::Serialize;

/// Full `companies` row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Company {
    pub id: i64,
    pub company_name: String,
    pub company_name_normalized: String,
    pub known_aliases: Option<String>,
    pub hq_country: Option<String>,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    pub company_type: Option<String>,
    pub geography: Option<String>,
    pub industry: Option<String>,
    pub suitability_tier: Option<String>,
}
