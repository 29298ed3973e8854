//! Router tests for paths that are decided before any storage call. The pool
//! points at a port nothing listens on, so a test that reached the database
//! would fail.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use event_api::db::Database;
use event_api::routes::create_routes;
use event_api::state::AppState;

fn unreachable_db() -> Database {
    let pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy("postgres://postgres@127.0.0.1:1/events")
        .unwrap();
    Database::from_pool(pool)
}

fn app() -> Router {
    create_routes(AppState::new(unreachable_db()))
}

async fn send(router: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = send(app(), Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Server is running");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_non_numeric_id_is_rejected() {
    for method in [Method::GET, Method::DELETE] {
        let (status, body) = send(app(), method, "/api/events/abc", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid ID");
    }

    let (status, body) = send(
        app(),
        Method::PUT,
        "/api/events/abc",
        Some(r#"{"title": "New"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid ID");
}

#[tokio::test]
async fn test_create_without_title_is_rejected() {
    let (status, body) = send(
        app(),
        Method::POST,
        "/api/events",
        Some(r#"{"start_time": "2024-05-01T10:00:00Z"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Title and start time are required");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_create_with_unparseable_start_time_is_rejected() {
    let (status, body) = send(
        app(),
        Method::POST,
        "/api/events",
        Some(r#"{"title": "Demo", "start_time": "tomorrow-ish"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_malformed_json_uses_envelope() {
    let (status, body) = send(app(), Method::POST, "/api/events", Some("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_update_cannot_null_title() {
    let (status, body) = send(
        app(),
        Method::PUT,
        "/api/events/1",
        Some(r#"{"title": null}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_list_rejects_bad_query_values() {
    let (status, _) = send(app(), Method::GET, "/api/events?limit=ten", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(), Method::GET, "/api/events?offset=-3", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(), Method::GET, "/api/events?startDate=someday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (status, body) = send(app(), Method::GET, "/api/nothing-here", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Route not found");
    assert_eq!(body["message"], "Route GET /api/nothing-here does not exist");
}

#[tokio::test]
async fn test_unsupported_method_is_not_found() {
    let (status, body) = send(app(), Method::PATCH, "/api/events/1", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Route PATCH /api/events/1 does not exist");
}

#[tokio::test]
async fn test_unsupported_method_on_health_is_not_found() {
    for method in [Method::POST, Method::DELETE] {
        let (status, body) = send(app(), method.clone(), "/health", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            format!("Route {} /health does not exist", method)
        );
    }
}

#[tokio::test]
async fn test_undecodable_id_uses_envelope() {
    for method in [Method::GET, Method::DELETE] {
        let (status, body) = send(app(), method, "/api/events/%FF", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid ID");
    }

    let (status, body) = send(
        app(),
        Method::PUT,
        "/api/events/%FF",
        Some(r#"{"title": "New"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid ID");
}

#[tokio::test]
async fn test_cors_preflight_is_answered() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/events")
                .header(header::ORIGIN, "http://calendar.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_storage_failure_is_server_error() {
    let db = unreachable_db();
    db.close().await;
    let router = create_routes(AppState::new(db.clone()));

    let (status, body) = send(router, Method::GET, "/api/events/1", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Internal server error");
    assert!(db.is_faulted());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
