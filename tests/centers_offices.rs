mod common;

use http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use centerwatch_api::csv_import::centers::CenterCsvRow;
use centerwatch_api::repo;

async fn seed_center(pool: &sqlx::SqlitePool) -> i64 {
    let row = CenterCsvRow {
        center_code: "MSK-01".to_owned(),
        name: "Main Street Cancer Center".to_owned(),
        lat: 40.7128,
        lon: -74.0060,
        country: Some("US".to_owned()),
        region: Some("NY".to_owned()),
        tier: Some("1".to_owned()),
        source_url: Some("https://example.org/msk-01".to_owned()),
    };

    repo::centers::upsert_center_from_csv(pool, &row, "sync-token-1")
        .await
        .expect("center upsert must succeed");

    sqlx::query_scalar("SELECT id FROM centers WHERE center_code = ?1")
        .bind(&row.center_code)
        .fetch_one(pool)
        .await
        .expect("seeded center must be readable")
}

#[tokio::test]
async fn list_centers_returns_active_centers() {
    let (pool, config) = common::test_config().await;
    seed_center(&pool).await;
    let (app, _state) = common::build_app(pool, config);

    let req = Request::builder()
        .uri("/api/centers")
        .body(axum::body::Body::empty())
        .expect("valid request");

    let res = app.oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.into_body().collect().await.expect("body readable").to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).expect("valid JSON body");

    let centers = json["centers"].as_array().expect("centers array");
    assert_eq!(centers.len(), 1);
    assert_eq!(centers[0]["centerCode"], "MSK-01");
}

#[tokio::test]
async fn list_offices_for_unknown_center_is_404() {
    let (pool, config) = common::test_config().await;
    let (app, _state) = common::build_app(pool, config);

    let req = Request::builder()
        .uri("/api/centers/999/offices")
        .body(axum::body::Body::empty())
        .expect("valid request");

    let res = app.oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_offices_rejects_oversized_search_term() {
    let (pool, config) = common::test_config().await;
    let center_id = seed_center(&pool).await;
    let (app, _state) = common::build_app(pool, config);

    let long_search = "a".repeat(121);
    let req = Request::builder()
        .uri(format!("/api/centers/{center_id}/offices?search={long_search}"))
        .body(axum::body::Body::empty())
        .expect("valid request");

    let res = app.oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

async fn seed_office_link(pool: &sqlx::SqlitePool, center_id: i64, osm_id: i64) {
    sqlx::query(
        "INSERT INTO offices (osm_type, osm_id, name, lat, lon, low_confidence) \
         VALUES ('node', ?1, 'Acme Corp', 40.71, -74.0, 0)",
    )
    .bind(osm_id)
    .execute(pool)
    .await
    .expect("office insert must succeed");

    sqlx::query(
        "INSERT INTO center_office (center_id, osm_type, osm_id, distance_m, last_seen) \
         VALUES (?1, 'node', ?2, 100.0, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
    )
    .bind(center_id)
    .bind(osm_id)
    .execute(pool)
    .await
    .expect("link insert must succeed");
}

#[tokio::test]
async fn flag_deletion_then_admin_can_list_and_approve_it() {
    let (pool, config) = common::test_config().await;
    let center_id = seed_center(&pool).await;
    seed_office_link(&pool, center_id, 12345).await;
    let (app, _state) = common::build_app(pool, config);

    let flag_body = serde_json::json!({
        "centerId": center_id,
        "osmType": "node",
        "osmId": 12345,
        "reason": "permanently closed"
    });

    let req = Request::builder()
        .method("POST")
        .uri("/api/offices/flag-deletion")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(flag_body.to_string()))
        .expect("valid request");

    let res = app.clone().oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.into_body().collect().await.expect("body readable").to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).expect("valid JSON body");
    assert_eq!(json["outcome"], "created");
    let flag_id = json["flagId"].as_i64().expect("flagId present");

    // Listing without a bearer token is unauthorized.
    let req = Request::builder()
        .uri("/api/admin/offices/deletion-flags")
        .body(axum::body::Body::empty())
        .expect("valid request");
    let res = app.clone().oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // With the admin token, the flag shows up pending.
    let req = Request::builder()
        .uri("/api/admin/offices/deletion-flags?status=pending")
        .header("authorization", format!("Bearer {}", common::ADMIN_TOKEN))
        .body(axum::body::Body::empty())
        .expect("valid request");
    let res = app.clone().oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.expect("body readable").to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).expect("valid JSON body");
    assert_eq!(json["flags"].as_array().expect("flags array").len(), 1);

    // Approving deletes the flag's office and its center link, transitioning
    // the flag to approved.
    let decision = serde_json::json!({ "decision": "approve" });
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/offices/deletion-flags/{flag_id}/decision"))
        .header("authorization", format!("Bearer {}", common::ADMIN_TOKEN))
        .header("content-type", "application/json")
        .body(axum::body::Body::from(decision.to_string()))
        .expect("valid request");
    let res = app.clone().oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.expect("body readable").to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).expect("valid JSON body");
    assert_eq!(json["outcome"], "approved");
    assert_eq!(json["deletedLinks"], 1);
    assert_eq!(json["deletedOffices"], 1);

    // Approving a second time is idempotent-ish: 200 with no further deletes.
    let decision = serde_json::json!({ "decision": "approve" });
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/offices/deletion-flags/{flag_id}/decision"))
        .header("authorization", format!("Bearer {}", common::ADMIN_TOKEN))
        .header("content-type", "application/json")
        .body(axum::body::Body::from(decision.to_string()))
        .expect("valid request");
    let res = app.clone().oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.expect("body readable").to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).expect("valid JSON body");
    assert_eq!(json["outcome"], "already_approved");

    // Rejecting an already-approved flag is a genuine conflict.
    let decision = serde_json::json!({ "decision": "reject" });
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/offices/deletion-flags/{flag_id}/decision"))
        .header("authorization", format!("Bearer {}", common::ADMIN_TOKEN))
        .header("content-type", "application/json")
        .body(axum::body::Body::from(decision.to_string()))
        .expect("valid request");
    let res = app.oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn flag_deletion_for_unknown_office_is_404() {
    let (pool, config) = common::test_config().await;
    let center_id = seed_center(&pool).await;
    let (app, _state) = common::build_app(pool, config);

    let flag_body = serde_json::json!({
        "centerId": center_id,
        "osmType": "node",
        "osmId": 999999,
    });

    let req = Request::builder()
        .method("POST")
        .uri("/api/offices/flag-deletion")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(flag_body.to_string()))
        .expect("valid request");

    let res = app.oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
