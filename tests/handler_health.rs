mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_health_endpoint_success() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["cache"]["status"], "ok");
    assert_eq!(json["checks"]["broker"]["status"], "ok");
}

#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = common::create_test_context();
    let server = common::make_server(&ctx);

    let response = server.get("/health").await;

    let json = response.json::<serde_json::Value>();

    assert!(json.get("status").is_some());
    assert!(json.get("version").is_some());
    assert!(json["checks"].get("database").is_some());
    assert!(json["checks"].get("cache").is_some());
    assert!(json["checks"].get("broker").is_some());
    assert_eq!(json["sync"]["hot_unflushed"], 0);
    assert_eq!(json["sync"]["untracked"], 0);
}

#[tokio::test]
async fn test_health_degraded_when_cache_down() {
    let ctx = common::create_test_context();
    ctx.cache.set_available(false);
    let server = common::make_server(&ctx);

    let response = server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["cache"]["status"], "error");
    assert_eq!(json["checks"]["database"]["status"], "ok");
}

#[tokio::test]
async fn test_health_degraded_when_store_down() {
    let ctx = common::create_test_context();
    ctx.store.set_available(false);
    let server = common::make_server(&ctx);

    let response = server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.json::<serde_json::Value>()["checks"]["database"]["status"],
        "error"
    );
}

#[tokio::test]
async fn test_health_reports_sync_summary() {
    let ctx = common::create_test_context();
    ctx.tracker.mark_ingested(1);
    ctx.tracker.mark_ingested(2);
    ctx.tracker.mark_reconciled(2);
    let server = common::make_server(&ctx);

    let json = server.get("/health").await.json::<serde_json::Value>();

    assert_eq!(json["sync"]["hot_unflushed"], 1);
    assert_eq!(json["sync"]["reconciled"], 1);
}
