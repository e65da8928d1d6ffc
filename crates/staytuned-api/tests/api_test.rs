//! Router-level tests against an engine backed by in-memory stores.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use staytuned_api::{AppState, build_router};
use staytuned_core::config::AppConfig;
use staytuned_core::types::{ChannelId, NotificationLevel, PostId, UserId};
use staytuned_realtime::testing::TestHarness;

const KEY: &str = "test-internal-key";

fn app(harness: &TestHarness) -> axum::Router {
    let mut config = AppConfig::default();
    config.server.internal_api_key = KEY.to_string();
    build_router(AppState::new(config, harness.engine.clone()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn publish_request(channel_id: ChannelId, key: Option<&str>, event: Value) -> Request<Body> {
    let mut builder = Request::post(format!("/internal/channels/{channel_id}/events"))
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-internal-key", key);
    }
    builder
        .body(Body::from(event.to_string()))
        .expect("request")
}

fn post_event() -> Value {
    let post_id = PostId::new();
    json!({
        "type": "post",
        "postId": post_id,
        "channelName": "Rust News",
        "content": "Hello subscribers",
        "post": { "id": post_id }
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let harness = TestHarness::default();
    let response = app(&harness)
        .oneshot(Request::get("/api/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn realtime_health_turns_503_when_store_degrades() {
    let harness = TestHarness::default();
    let router = app(&harness);

    let response = router
        .clone()
        .oneshot(
            Request::get("/api/health/realtime")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);

    for _ in 0..harness.engine.config().notifications.degraded_after_failures {
        harness.engine.store_health.record_failure();
    }

    let response = router
        .oneshot(
            Request::get("/api/health/realtime")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["store"]["status"], "degraded");
}

#[tokio::test]
async fn ws_without_token_is_unauthorized() {
    let harness = TestHarness::default();
    let response = app(&harness)
        .oneshot(Request::get("/ws").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn ws_with_valid_token_but_no_upgrade_is_cleaned_up() {
    let harness = TestHarness::default();
    let (token, _) = harness.tokens.issue("alice");

    let response = app(&harness)
        .oneshot(
            Request::get(format!("/ws?token={token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert!(response.status().is_client_error());
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.engine.sessions.session_count(), 0);
}

#[tokio::test]
async fn internal_routes_require_key() {
    let harness = TestHarness::default();
    let router = app(&harness);

    let missing = router
        .clone()
        .oneshot(publish_request(ChannelId::new(), None, post_event()))
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = router
        .oneshot(publish_request(ChannelId::new(), Some("nope"), post_event()))
        .await
        .expect("response");
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn publish_returns_delivery_report() {
    let harness = TestHarness::default();
    let channel = ChannelId::new();
    let offline = UserId::new();
    harness
        .store
        .subscribe(offline, channel, NotificationLevel::All);

    let response = app(&harness)
        .oneshot(publish_request(channel, Some(KEY), post_event()))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["seq"], 1);
    assert_eq!(report["eligibleUsers"], 1);
    assert_eq!(report["notificationsPersisted"], 1);
    assert_eq!(harness.store.notifications_for(offline).len(), 1);
}

#[tokio::test]
async fn publish_with_failed_writes_is_multi_status() {
    let harness = TestHarness::default();
    let channel = ChannelId::new();
    let offline = UserId::new();
    harness
        .store
        .subscribe(offline, channel, NotificationLevel::All);
    harness.store.set_notifications_down(true);

    let response = app(&harness)
        .oneshot(publish_request(channel, Some(KEY), post_event()))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::MULTI_STATUS);
    let report = body_json(response).await;
    assert_eq!(report["failures"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn subscription_change_invalidates_cache() {
    let harness = TestHarness::default();
    let router = app(&harness);
    let channel = ChannelId::new();
    let user = UserId::new();

    let first = router
        .clone()
        .oneshot(publish_request(channel, Some(KEY), post_event()))
        .await
        .expect("response");
    assert_eq!(body_json(first).await["eligibleUsers"], 0);

    harness.store.subscribe(user, channel, NotificationLevel::All);
    let changed = router
        .clone()
        .oneshot(
            Request::post("/internal/subscriptions/changed")
                .header("content-type", "application/json")
                .header("x-internal-key", KEY)
                .body(Body::from(json!({ "channelId": channel }).to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(changed.status(), StatusCode::NO_CONTENT);

    let second = router
        .oneshot(publish_request(channel, Some(KEY), post_event()))
        .await
        .expect("response");
    assert_eq!(body_json(second).await["eligibleUsers"], 1);
}
