mod common;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

use common::{get as get_request, harness, json_body};
use gatekeeper::catalog::{CatalogError, ExerciseCatalog, HttpCatalog};
use gatekeeper::config::UpstreamConfig;
use gatekeeper::http::router;

/// Start a stand-in catalog upstream on an ephemeral port.
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/exercises/bodyPartList",
            get(|| async { Json(vec!["back", "cardio"]) }),
        )
        .route(
            "/exercises/targetList",
            get(|headers: HeaderMap| async move {
                // Only callers presenting the key get data
                match headers.get("x-api-key") {
                    Some(key) if key == "secret" => Ok(Json(vec!["abs"])),
                    _ => Err(StatusCode::UNAUTHORIZED),
                }
            }),
        )
        .route(
            "/exercises/equipmentList",
            get(|| async { "not json" }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, api_key: Option<&str>) -> HttpCatalog {
    HttpCatalog::new(&UpstreamConfig {
        base_url: format!("http://{}/", addr),
        api_key: api_key.map(str::to_string),
        timeout_ms: 2_000,
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetches_list() {
    let addr = spawn_upstream().await;
    let catalog = client(addr, None);

    let body_parts = tokio_test::assert_ok!(catalog.body_parts().await);
    assert_eq!(body_parts, vec!["back", "cardio"]);
}

#[tokio::test]
async fn test_sends_api_key() {
    let addr = spawn_upstream().await;

    let with_key = client(addr, Some("secret"));
    assert_eq!(with_key.targets().await.unwrap(), vec!["abs"]);

    let without_key = client(addr, None);
    let result = without_key.targets().await;
    assert!(matches!(
        result,
        Err(CatalogError::Status(status)) if status == reqwest::StatusCode::UNAUTHORIZED
    ));
}

#[tokio::test]
async fn test_malformed_payload_is_error() {
    let addr = spawn_upstream().await;
    let catalog = client(addr, None);

    tokio_test::assert_err!(catalog.equipment().await);
}

#[tokio::test]
async fn test_upstream_errors_become_502_end_to_end() {
    let addr = spawn_upstream().await;
    let h = harness(Arc::new(client(addr, None)));
    let app = router(h.state);

    // targetList rejects the missing key, equipmentList is malformed
    let response = app
        .clone()
        .oneshot(get_request("/api/exercises/lists", Some("device-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "error": "external_api_error" })
    );

    let response = app
        .oneshot(get_request("/api/exercises/body-parts", Some("device-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "bodyParts": ["back", "cardio"] })
    );
}
