mod common;

use axum::http::StatusCode;
use serde_json::json;

// ─── ACCEPTED ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_click_success() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    let response = server.post("/ads/click").json(&common::click_body(42)).await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "success");
    assert_eq!(json["message"], "Click event received");
}

#[tokio::test]
async fn test_click_is_published_with_ad_key() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    server
        .post("/ads/click")
        .json(&common::click_body(42))
        .await
        .assert_status_ok();

    let published = ctx.broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].key, "42");

    let payload: serde_json::Value = serde_json::from_str(&published[0].payload).unwrap();
    assert_eq!(payload["id"], 42);
    assert_eq!(payload["ip"], "1.2.3.4");
    assert!(payload["timestamp"].is_string());
}

#[tokio::test]
async fn test_click_updates_aggregate_cache() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    server
        .post("/ads/click")
        .json(&common::click_body(42))
        .await
        .assert_status_ok();

    common::wait_for_cache(&ctx.cache, "ad-42", "clicks", "1").await;
    common::wait_for_cache(&ctx.cache, "time-42", "impression", "2").await;
    assert_eq!(
        common::cache_field(&ctx.cache, "time-42", "playbacktime").as_deref(),
        Some("50")
    );
}

#[tokio::test]
async fn test_click_accepts_ipv6() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    let response = server
        .post("/ads/click")
        .json(&json!({
            "id": 7,
            "ip": "2001:db8::1",
            "playback_time": 1.5,
            "timeframe": 3
        }))
        .await;

    response.assert_status_ok();
}

// ─── VALIDATION ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_click_invalid_ip() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    let mut body = common::click_body(42);
    body["ip"] = json!("not-an-ip");

    let response = server.post("/ads/click").json(&body).await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "validation_error");
    assert_eq!(json["error"]["details"]["field"], "ip");
    assert!(ctx.broker.published().is_empty());
}

#[tokio::test]
async fn test_click_rejects_non_positive_values() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    for (field, value) in [("id", json!(0)), ("playback_time", json!(0)), ("timeframe", json!(-2))] {
        let mut body = common::click_body(42);
        body[field] = value;

        let response = server.post("/ads/click").json(&body).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<serde_json::Value>();
        assert_eq!(json["error"]["details"]["field"], field);
    }

    assert!(ctx.broker.published().is_empty());
    assert!(ctx.cache.snapshot().is_empty());
}

#[tokio::test]
async fn test_click_wrong_type_names_field() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    for (field, value) in [
        ("id", json!("abc")),
        ("ip", json!(1234)),
        ("playback_time", json!("fifty")),
        ("timeframe", json!(true)),
    ] {
        let mut body = common::click_body(42);
        body[field] = value;

        let response = server.post("/ads/click").json(&body).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<serde_json::Value>();
        assert_eq!(json["error"]["code"], "validation_error");
        assert_eq!(json["error"]["details"]["field"], field);
        assert_eq!(json["error"]["details"]["constraint"], "type");
    }

    assert!(ctx.broker.published().is_empty());
}

#[tokio::test]
async fn test_click_missing_field() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    let response = server
        .post("/ads/click")
        .json(&json!({ "id": 42, "playback_time": 50, "timeframe": 25 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["details"]["field"], "ip");
    assert_eq!(json["error"]["details"]["constraint"], "required");
}

#[tokio::test]
async fn test_click_malformed_json() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    let response = server
        .post("/ads/click")
        .bytes("{\"id\": 42,".into())
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "validation_error");
}

// ─── BROKER FAILURE ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_click_broker_unavailable() {
    let ctx = common::create_test_context();
    ctx.broker.set_available(false);
    let server = common::make_server(&ctx);

    let response = server.post("/ads/click").json(&common::click_body(42)).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "upstream_unavailable");
}

#[tokio::test]
async fn test_click_succeeds_when_cache_is_down() {
    let ctx = common::create_test_context();
    ctx.cache.set_available(false);
    let server = common::make_server(&ctx);

    let response = server.post("/ads/click").json(&common::click_body(42)).await;

    response.assert_status_ok();
    assert_eq!(ctx.broker.published().len(), 1);
}
