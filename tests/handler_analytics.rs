mod common;

use ad_click_pipeline::domain::cache_key::AggregateKey;
use axum::http::StatusCode;

#[tokio::test]
async fn test_analytics_from_warm_cache() {
    let ctx = common::create_test_context();
    ctx.cache.put_raw(AggregateKey::counter(42), "clicks", "5");
    ctx.cache.put_raw(AggregateKey::stats(42), "impression", "2");
    ctx.cache.put_raw(AggregateKey::stats(42), "timeframe", "25");
    ctx.cache.put_raw(AggregateKey::stats(42), "playbacktime", "50");
    let server = common::make_server(&ctx);

    let response = server.get("/ads/analytics/42").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["ad_id"], 42);
    assert_eq!(json["clicks"], 5);
    assert_eq!(json["impression"], 2.0);
    assert_eq!(json["CTR"], 250);
}

#[tokio::test]
async fn test_analytics_cold_cache_rebuilds_then_serves() {
    let ctx = common::create_test_context();
    ctx.store.insert_ad(42, "img", "target", 0);
    ctx.store.insert_click(common::click_row(42, 0, 10.0, 10.0));
    ctx.store.insert_click(common::click_row(42, 5, 50.0, 25.0));
    let server = common::make_server(&ctx);

    let first = server.get("/ads/analytics/42").await;
    first.assert_status(StatusCode::NOT_FOUND);

    let second = server.get("/ads/analytics/42").await;
    second.assert_status_ok();

    let json = second.json::<serde_json::Value>();
    assert_eq!(json["clicks"], 2);
    assert_eq!(json["impression"], 2.0);
    assert_eq!(json["CTR"], 100);
}

#[tokio::test]
async fn test_analytics_unknown_ad_stays_not_found() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    for _ in 0..2 {
        let response = server.get("/ads/analytics/999").await;
        response.assert_status(StatusCode::NOT_FOUND);

        let json = response.json::<serde_json::Value>();
        assert_eq!(json["error"]["code"], "not_found");
    }
}

#[tokio::test]
async fn test_analytics_invalid_id() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    for raw in ["abc", "0", "-3", "1.5"] {
        let response = server.get(&format!("/ads/analytics/{raw}")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_analytics_malformed_cache_value() {
    let ctx = common::create_test_context();
    ctx.cache.put_raw(AggregateKey::counter(8), "clicks", "lots");
    ctx.cache.put_raw(AggregateKey::stats(8), "impression", "2");
    ctx.cache.put_raw(AggregateKey::stats(8), "timeframe", "1");
    ctx.cache.put_raw(AggregateKey::stats(8), "playbacktime", "2");
    let server = common::make_server(&ctx);

    let response = server.get("/ads/analytics/8").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}
