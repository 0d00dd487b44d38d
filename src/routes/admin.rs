use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;

use crate::csv_import::centers::parse_centers_csv;
use crate::csv_import::companies::parse_companies_csv;
use crate::error::AppError;
use crate::matcher::CompanyIndex;
use crate::middleware::auth::AdminUser;
use crate::models::FlagStatus;
use crate::refresh::{self, FullSweepOptions, RefreshOptions};
use crate::repo;
use crate::repo::flags::{Decision, FlagDecisionOutcome};
use crate::repo::InsertOutcome;
use crate::AppState;

const ALLOWED_REFRESH_RADII_KM: [i64; 4] = [10, 25, 50, 100];

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/centers/upload-csv", post(upload_centers_csv))
        .route("/admin/companies/upload-csv", post(upload_companies_csv))
        .route("/admin/refresh-center/{id}", post(refresh_center))
        .route("/admin/refresh-batch", post(refresh_batch))
        .route("/admin/refresh-all", post(refresh_all))
        .route("/admin/offices/deletion-flags", get(list_deletion_flags))
        .route(
            "/admin/offices/deletion-flags/{flag_id}/decision",
            post(decide_deletion_flag),
        )
        .route("/admin/status", get(status))
}

async fn read_multipart_file(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            return field
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| AppError::BadRequest(format!("failed to read file part: {e}")));
        }
    }
    Err(AppError::BadRequest("missing 'file' multipart field".to_owned()))
}

/// `POST /api/admin/centers/upload-csv`
async fn upload_centers_csv(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let bytes = read_multipart_file(multipart).await?;
    let parsed = parse_centers_csv(&bytes).map_err(|e| AppError::BadRequest(e.to_string()))?;

    if parsed.rows.is_empty() {
        return Err(AppError::BadRequest(
            "no rows were accepted from the uploaded file".to_owned(),
        ));
    }

    let sync_token = generate_sync_token();
    let mut inserted = 0u32;
    let mut updated = 0u32;

    for row in &parsed.rows {
        match repo::centers::upsert_center_from_csv(&state.pool, row, &sync_token).await? {
            repo::UpsertOutcome::Inserted => inserted += 1,
            repo::UpsertOutcome::Updated => updated += 1,
        }
    }

    let disabled = repo::centers::disable_centers_missing_from_sync(&state.pool, &sync_token).await?;

    Ok(Json(serde_json::json!({
        "inserted": inserted,
        "updated": updated,
        "disabled": disabled,
        "issues": parsed.issues,
    })))
}

/// `POST /api/admin/companies/upload-csv`
async fn upload_companies_csv(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let bytes = read_multipart_file(multipart).await?;
    let parsed = parse_companies_csv(&bytes).map_err(|e| AppError::BadRequest(e.to_string()))?;

    if parsed.rows.is_empty() {
        return Err(AppError::BadRequest(
            "no rows were accepted from the uploaded file".to_owned(),
        ));
    }

    let mut inserted = 0u32;
    let mut skipped = 0u32;

    for row in &parsed.rows {
        match repo::companies::insert_company_from_csv(&state.pool, row).await? {
            InsertOutcome::Inserted => inserted += 1,
            InsertOutcome::Skipped => skipped += 1,
        }
    }

    Ok(Json(serde_json::json!({
        "inserted": inserted,
        "skipped": skipped,
        "issues": parsed.issues,
    })))
}

#[derive(Debug, Deserialize, Default)]
struct RefreshCenterBody {
    #[serde(rename = "radiusKm")]
    radius_km: Option<i64>,
    #[serde(rename = "maxOffices")]
    max_offices: Option<i64>,
}

/// `POST /api/admin/refresh-center/{id}`
async fn refresh_center(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    body: Option<Json<RefreshCenterBody>>,
) -> Result<impl IntoResponse, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let radius_km = body.radius_km.unwrap_or(25);
    if !ALLOWED_REFRESH_RADII_KM.contains(&radius_km) {
        return Err(AppError::BadRequest(
            "radiusKm must be one of 10, 25, 50, 100".to_owned(),
        ));
    }

    if let Some(max_offices) = body.max_offices {
        if !(1..=10_000).contains(&max_offices) {
            return Err(AppError::BadRequest(
                "maxOffices must be between 1 and 10000".to_owned(),
            ));
        }
    }

    let center = repo::centers::get_center_by_id(&state.pool, id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::NotFound("center not found or inactive".to_owned()))?;

    let companies = repo::companies::load_company_index(&state.pool).await?;
    let index = CompanyIndex::build(&companies);
    let banned_set = load_banned_set(&state).await?;

    let opts = RefreshOptions {
        radius_m: radius_km * 1000,
        max_offices: body.max_offices,
    };

    let counts = refresh::refresh_center(
        &state.pool,
        &state.config,
        &state.http_client,
        &center,
        opts,
        &index,
        &banned_set,
    )
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({ "ok": true, "counts": counts })))
}

/// `POST /api/admin/refresh-batch`
async fn refresh_batch(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let outcome = refresh::run_scheduled_refresh(&state.pool, &state.config, &state.http_client)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({ "ok": true, "batch": outcome })))
}

#[derive(Debug, Deserialize, Default)]
struct RefreshAllBody {
    #[serde(rename = "delayMs")]
    delay_ms: Option<u64>,
    #[serde(rename = "batchSize")]
    batch_size: Option<i64>,
    #[serde(rename = "radiusKm")]
    radius_km: Option<i64>,
    #[serde(rename = "maxOffices")]
    max_offices: Option<i64>,
    #[serde(rename = "fullClean")]
    full_clean: Option<bool>,
    #[serde(rename = "centerRetryCount")]
    center_retry_count: Option<u32>,
    #[serde(rename = "retryDelayMs")]
    retry_delay_ms: Option<u64>,
}

/// `POST /api/admin/refresh-all`
async fn refresh_all(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    body: Option<Json<RefreshAllBody>>,
) -> Result<impl IntoResponse, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let radius_km = body.radius_km.unwrap_or(25);
    if !ALLOWED_REFRESH_RADII_KM.contains(&radius_km) {
        return Err(AppError::BadRequest(
            "radiusKm must be one of 10, 25, 50, 100".to_owned(),
        ));
    }
    if let Some(max_offices) = body.max_offices {
        if !(1..=10_000).contains(&max_offices) {
            return Err(AppError::BadRequest(
                "maxOffices must be between 1 and 10000".to_owned(),
            ));
        }
    }

    let opts = FullSweepOptions {
        throttle_ms: body.delay_ms.unwrap_or(state.config.overpass_throttle_ms).min(15_000),
        batch_size: body.batch_size.unwrap_or(state.config.batch_centers_per_run).clamp(1, 200),
        radius_m: radius_km * 1000,
        max_offices: body.max_offices,
        full_clean: body.full_clean.unwrap_or(false),
        center_retry_count: body
            .center_retry_count
            .unwrap_or(state.config.refresh_center_retry_count),
        retry_delay_ms: body
            .retry_delay_ms
            .unwrap_or(state.config.refresh_center_retry_delay_ms)
            .min(60_000),
    };

    let outcome = refresh::run_refresh_all(&state.pool, &state.config, &state.http_client, opts)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!(outcome)))
}

#[derive(Debug, Deserialize)]
struct ListFlagsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

/// `GET /api/admin/offices/deletion-flags?status=&limit=`
async fn list_deletion_flags(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ListFlagsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let status = match query.status.as_deref() {
        None | Some("all") => None,
        Some(raw) => Some(
            FlagStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest("status must be pending, approved, rejected, or all".to_owned()))?,
        ),
    };

    let flags = repo::flags::list_flags(&state.pool, status, query.limit).await?;

    Ok(Json(serde_json::json!({ "flags": flags })))
}

#[derive(Debug, Deserialize)]
struct DecisionBody {
    decision: String,
}

/// `POST /api/admin/offices/deletion-flags/{flagId}/decision`
async fn decide_deletion_flag(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(flag_id): Path<i64>,
    Json(body): Json<DecisionBody>,
) -> Result<impl IntoResponse, AppError> {
    let decision = match body.decision.as_str() {
        "approve" => Decision::Approve,
        "reject" => Decision::Reject,
        _ => return Err(AppError::BadRequest("decision must be approve or reject".to_owned())),
    };

    let outcome = repo::flags::decide_flag(&state.pool, flag_id, decision).await?;

    match outcome {
        FlagDecisionOutcome::NotFound => Err(AppError::NotFound("deletion flag not found".to_owned())),
        FlagDecisionOutcome::AlreadyApproved => Ok(Json(serde_json::json!({ "outcome": "already_approved" }))),
        FlagDecisionOutcome::CannotRejectApproved => {
            Err(AppError::Conflict("flag is already approved".to_owned()))
        }
        FlagDecisionOutcome::AlreadyRejected => Ok(Json(serde_json::json!({ "outcome": "already_rejected" }))),
        FlagDecisionOutcome::Approved { deleted_links, deleted_offices } => Ok(Json(serde_json::json!({
            "outcome": "approved",
            "deletedLinks": deleted_links,
            "deletedOffices": deleted_offices,
        }))),
        FlagDecisionOutcome::Rejected => Ok(Json(serde_json::json!({ "outcome": "rejected" }))),
    }
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    #[serde(default, rename = "includeCounts")]
    include_counts: bool,
}

/// `GET /api/admin/status?includeCounts=`
async fn status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, AppError> {
    let centers_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM centers")
        .fetch_one(&state.pool)
        .await?;
    let active_centers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM centers WHERE is_active = 1")
        .fetch_one(&state.pool)
        .await?;

    let refresh_row = repo::refresh_state::get_refresh_state_row(&state.pool).await?;
    let (cursor, refresh_updated_at) = match &refresh_row {
        Some((value, updated_at)) => (value.parse::<i64>().unwrap_or(0), Some(*updated_at)),
        None => (0, None),
    };

    let age_minutes = refresh_updated_at.map(|ts| (Utc::now() - ts).num_minutes());
    let refresh_recent_enough = age_minutes
        .map(|age| age <= state.config.refresh_health_max_age_minutes)
        .unwrap_or(false);

    let mut metrics = serde_json::json!({
        "centersTotal": centers_total,
        "activeCenters": active_centers,
    });

    if query.include_counts {
        let offices_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offices")
            .fetch_one(&state.pool)
            .await?;
        let links_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM center_office")
            .fetch_one(&state.pool)
            .await?;
        metrics["exactCounts"] = serde_json::json!(true);
        metrics["officesTotal"] = serde_json::json!(offices_total);
        metrics["centerOfficeLinksTotal"] = serde_json::json!(links_total);
    } else {
        metrics["exactCounts"] = serde_json::json!(false);
    }

    let active_centers_at_least_one = active_centers > 0;
    let refresh_state_present = refresh_row.is_some();
    let ok = active_centers_at_least_one && refresh_state_present && refresh_recent_enough;

    Ok(Json(serde_json::json!({
        "ok": ok,
        "generatedAt": Utc::now(),
        "checks": {
            "activeCentersAtLeastOne": active_centers_at_least_one,
            "refreshStatePresent": refresh_state_present,
            "refreshRecentEnough": refresh_recent_enough,
        },
        "thresholds": {
            "maxRefreshAgeMinutes": state.config.refresh_health_max_age_minutes,
        },
        "metrics": metrics,
        "refresh": {
            "cursor": cursor,
            "updatedAt": refresh_updated_at,
            "ageMinutes": age_minutes,
        },
    })))
}

async fn load_banned_set(
    state: &AppState,
) -> Result<std::collections::HashSet<crate::models::OfficeKey>, AppError> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT osm_type, osm_id FROM banned_offices")
        .fetch_all(&state.pool)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(t, id)| {
            crate::models::OsmType::parse(&t)
                .map(|osm_type| crate::models::OfficeKey { osm_type, osm_id: id })
        })
        .collect())
}

fn generate_sync_token() -> String {
    let mut rng = rand::thread_rng();
    let value: u128 = rng.gen();
    format!("{value:032x}")
}
