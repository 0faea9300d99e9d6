// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/sources
// - GET /api/summary (empty store)
// - GET /api/correlation (validation + empty-store sentinel)

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use crypto_sentiment_pipeline::api;
use crypto_sentiment_pipeline::config::PipelineConfig;
use crypto_sentiment_pipeline::store::MemStore;

const BODY_LIMIT: usize = 1024 * 1024;

/// Build the same Router the binary uses, over an empty in-memory store.
fn test_router() -> Router {
    let store = Arc::new(MemStore::new());
    let cfg = Arc::new(PipelineConfig::default_seed());
    api::create_router(store, cfg)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let app = test_router();
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    assert_eq!(String::from_utf8_lossy(&bytes).trim(), "ok");
}

#[tokio::test]
async fn sources_lists_the_configured_registry() {
    let (status, json) = get_json(test_router(), "/api/sources").await;
    assert_eq!(status, StatusCode::OK);

    let arr = json.as_array().expect("array body");
    assert_eq!(arr.len(), 4);
    let kinds: Vec<&str> = arr
        .iter()
        .map(|s| s["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"crypto"));
    assert!(kinds.contains(&"index"));
    assert!(kinds.contains(&"news"));
}

#[tokio::test]
async fn summary_on_empty_store_is_neutral() {
    let (status, json) = get_json(test_router(), "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["crypto_articles"], 0);
    assert_eq!(json["economy_articles"], 0);
    assert_eq!(json["divergence"], 0.0);
}

#[tokio::test]
async fn correlation_rejects_unknown_lookback() {
    let (status, json) = get_json(
        test_router(),
        "/api/correlation?price=bitcoin_price&news=bitcoin_articles&lookback=1y",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("lookback"));
}

#[tokio::test]
async fn correlation_on_empty_store_has_null_coefficient() {
    let (status, json) = get_json(
        test_router(),
        "/api/correlation?price=bitcoin_price&news=bitcoin_articles&lookback=7d",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["points"], 0);
    assert!(json["coefficient"].is_null());
    assert_eq!(json["lookback"], "7d");
}

#[tokio::test]
async fn correlation_defaults_to_seven_days() {
    let (status, json) = get_json(
        test_router(),
        "/api/correlation?price=bitcoin_price&news=bitcoin_articles",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["lookback"], "7d");
}
