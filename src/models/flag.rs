use chrono::{DateTime, Utc};
use serde::Serialize;

/// `office_deletion_flags.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    Pending,
    Approved,
    Rejected,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Full `office_deletion_flags` row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DeletionFlag {
    pub id: i64,
    pub center_id: Option<i64>,
    pub osm_type: String,
    pub osm_id: i64,
    pub reason: Option<String>,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}
