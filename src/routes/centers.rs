use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppError;
use crate::matcher::{self, CompanyIndex};
use crate::repo;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/centers", get(list_centers))
        .route("/centers/{id}/offices", get(list_offices))
}

#[derive(Debug, Deserialize)]
struct ListCentersQuery {
    tier: Option<String>,
    #[serde(default = "default_true", rename = "activeOnly")]
    active_only: bool,
}

fn default_true() -> bool {
    true
}

/// `GET /api/centers?tier=&activeOnly=`
async fn list_centers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCentersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let centers =
        repo::centers::list_centers(&state.pool, query.tier.as_deref(), query.active_only).await?;

    Ok(Json(serde_json::json!({ "centers": centers })))
}

#[derive(Debug, Deserialize)]
struct ListOfficesQuery {
    #[serde(rename = "radiusKm")]
    radius_km: Option<f64>,
    limit: Option<i64>,
    #[serde(default, rename = "highConfidenceOnly")]
    high_confidence_only: bool,
    search: Option<String>,
}

/// `GET /api/centers/{id}/offices?radiusKm=&limit=&highConfidenceOnly=&search=`
async fn list_offices(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<ListOfficesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let center = repo::centers::get_center_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("center not found".to_owned()))?;

    let cap_km = (state.config.default_radius_m as f64 / 1000.0).max(1.0);
    let radius_km = query.radius_km.unwrap_or(25.0).clamp(1.0, cap_km);

    if let Some(limit) = query.limit {
        if limit <= 0 {
            return Err(AppError::BadRequest("limit must be positive".to_owned()));
        }
    }

    if let Some(search) = &query.search {
        if search.chars().count() > 120 {
            return Err(AppError::BadRequest(
                "search must be at most 120 characters".to_owned(),
            ));
        }
    }

    let offices = repo::offices::list_offices_for_center(
        &state.pool,
        center.id,
        radius_km * 1000.0,
        query.limit,
        query.high_confidence_only,
        query.search.as_deref(),
    )
    .await?;

    let companies = repo::companies::load_company_index(&state.pool).await?;
    let index = CompanyIndex::build(&companies);

    let offices: Vec<_> = offices
        .into_iter()
        .map(|office| attach_linked_company(&index, office))
        .collect();

    Ok(Json(serde_json::json!({
        "center": {
            "id": center.id,
            "centerCode": center.center_code,
            "name": center.name,
            "lat": center.lat,
            "lon": center.lon,
        },
        "radiusKm": radius_km,
        "offices": offices,
    })))
}

fn attach_linked_company(
    index: &CompanyIndex,
    office: crate::models::OfficeWithDistance,
) -> serde_json::Value {
    let candidate = crate::models::CandidateOffice {
        osm_type: crate::models::OsmType::parse(&office.osm_type)
            .unwrap_or(crate::models::OsmType::Node),
        osm_id: office.osm_id,
        name: office.name.clone().unwrap_or_default(),
        brand: office.brand.clone(),
        operator: office.operator.clone(),
        website: office.website.clone(),
        wikidata: office.wikidata.clone(),
        wikidata_entity_id: office.wikidata_entity_id.clone(),
        lat: office.lat,
        lon: office.lon,
        low_confidence: office.low_confidence,
        tags_json: None,
    };

    let linked = matcher::match_office(index, &candidate);

    serde_json::json!({
        "osmType": office.osm_type,
        "osmId": office.osm_id,
        "name": office.name,
        "brand": office.brand,
        "operator": office.operator,
        "website": office.website,
        "wikidata": office.wikidata,
        "wikidataEntityId": office.wikidata_entity_id,
        "employeeCount": office.employee_count,
        "employeeCountAsOf": office.employee_count_as_of,
        "marketCap": office.market_cap,
        "marketCapCurrencyQid": office.market_cap_currency_qid,
        "marketCapAsOf": office.market_cap_as_of,
        "wikidataEnrichedAt": office.wikidata_enriched_at,
        "lat": office.lat,
        "lon": office.lon,
        "lowConfidence": office.low_confidence,
        "distanceM": office.distance_m,
        "linkedCompanyId": linked.as_ref().map(|m| m.company_id),
        "linkedCompanyName": linked.as_ref().map(|m| m.company_name.clone()),
    })
}
