//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, build_test_app, send};

#[tokio::test]
async fn health_check_returns_healthy_with_status() {
    let app = build_test_app();
    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
    assert!(json["timestamp"].is_string());
    assert!(json["uptime"].as_f64().unwrap() >= 0.0);
    assert_eq!(json["currentStatus"]["running"], false);
}

#[tokio::test]
async fn health_reflects_running_instance() {
    let app = build_test_app();
    app.get("/start_comfyui/Shakthi").await;

    let json = app.get_json("/health").await;
    assert_eq!(json["currentStatus"]["running"], true);
    assert_eq!(json["currentStatus"]["user"], "Shakthi");
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app();
    let response = app.get("/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = build_test_app();
    let request = axum::http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/status")
        .header("origin", "http://localhost:8000")
        .header("access-control-request-method", "GET")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:8000"
    );
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let app = build_test_app();

    let response = send(app.router.clone(), Method::POST, "/no/such/thing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Endpoint not found: POST /no/such/thing");
}
