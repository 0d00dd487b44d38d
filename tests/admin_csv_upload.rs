mod common;

use http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

const CENTERS_CSV: &str = "center_code,name,lat,lon,country,region,tier,source_url\n\
MSK-01,Main Street Cancer Center,40.7128,-74.0060,US,NY,1,https://example.org/msk-01\n\
BAD-01,Broken Row,999,0,US,CA,1,https://example.org/bad\n";

fn multipart_body(field_name: &str, filename: &str, contents: &str, boundary: &str) -> String {
    format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {contents}\r\n--{boundary}--\r\n"
    )
}

#[tokio::test]
async fn centers_csv_upload_accepts_valid_rows_and_reports_issues() {
    let (pool, config) = common::test_config().await;
    let (app, _state) = common::build_app(pool, config);

    let boundary = "test-boundary-centers";
    let body = multipart_body("file", "centers.csv", CENTERS_CSV, boundary);

    let req = Request::builder()
        .method("POST")
        .uri("/api/admin/centers/upload-csv")
        .header("authorization", format!("Bearer {}", common::ADMIN_TOKEN))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(axum::body::Body::from(body))
        .expect("valid request");

    let res = app.oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.into_body().collect().await.expect("body readable").to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).expect("valid JSON body");

    assert_eq!(json["inserted"], 1);
    assert_eq!(json["issues"].as_array().expect("issues array").len(), 1);
}

#[tokio::test]
async fn centers_csv_upload_without_admin_token_is_unauthorized() {
    let (pool, config) = common::test_config().await;
    let (app, _state) = common::build_app(pool, config);

    let boundary = "test-boundary-noauth";
    let body = multipart_body("file", "centers.csv", CENTERS_CSV, boundary);

    let req = Request::builder()
        .method("POST")
        .uri("/api/admin/centers/upload-csv")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(axum::body::Body::from(body))
        .expect("valid request");

    let res = app.oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn companies_csv_upload_requires_at_least_one_accepted_row() {
    let (pool, config) = common::test_config().await;
    let (app, _state) = common::build_app(pool, config);

    let boundary = "test-boundary-companies-empty";
    let csv = "company_name\n\n";
    let body = multipart_body("file", "companies.csv", csv, boundary);

    let req = Request::builder()
        .method("POST")
        .uri("/api/admin/companies/upload-csv")
        .header("authorization", format!("Bearer {}", common::ADMIN_TOKEN))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(axum::body::Body::from(body))
        .expect("valid request");

    let res = app.oneshot(req).await.expect("service ready");
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
