use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::OsmType;
use crate::repo;
use crate::repo::flags::FlagSubmitOutcome;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/offices/flag-deletion", post(flag_deletion))
}

#[derive(Debug, Deserialize)]
struct FlagDeletionBody {
    #[serde(rename = "centerId")]
    center_id: Option<i64>,
    #[serde(rename = "osmType")]
    osm_type: String,
    #[serde(rename = "osmId")]
    osm_id: i64,
    reason: Option<String>,
}

/// `POST /api/offices/flag-deletion`
async fn flag_deletion(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FlagDeletionBody>,
) -> Result<impl IntoResponse, AppError> {
    let osm_type = OsmType::parse(&body.osm_type)
        .ok_or_else(|| AppError::BadRequest("osmType must be node, way, or relation".to_owned()))?;

    let outcome = repo::flags::submit_deletion_flag(
        &state.pool,
        body.center_id,
        osm_type.as_str(),
        body.osm_id,
        body.reason.as_deref(),
    )
    .await?;

    let payload = match outcome {
        FlagSubmitOutcome::Created(id) => {
            serde_json::json!({ "outcome": "created", "flagId": id })
        }
        FlagSubmitOutcome::AlreadyPending(id) => {
            serde_json::json!({ "outcome": "already_pending", "flagId": id })
        }
        FlagSubmitOutcome::AlreadyBanned => {
            serde_json::json!({ "outcome": "already_banned" })
        }
        FlagSubmitOutcome::NotFound => {
            return Err(AppError::NotFound(
                "office not found for the given center and osm id".to_owned(),
            ))
        }
    };

    Ok(Json(payload))
}
