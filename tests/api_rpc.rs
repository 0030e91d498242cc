//! JSON-RPC adapter tests

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::memory_engine;
use groupbuy::api::router;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn call(app: &Router, method: &str, params: Value) -> Value {
    let body = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn error_code(response: &Value) -> i64 {
    response["error"]["code"].as_i64().unwrap_or_default()
}

#[tokio::test]
async fn test_create_join_and_process_over_rpc() {
    let engine = memory_engine();
    let app = router(engine.app_state());

    let created = call(
        &app,
        "createBatch",
        json!({ "productId": "P1", "batchType": "fast", "price": 100.0, "buyersRequired": 2 }),
    )
    .await;
    let batch = &created["result"];
    assert_eq!(batch["status"], "forming");
    assert_eq!(batch["deliveryTime"], "3 days");
    let batch_id = batch["id"].as_str().unwrap().to_string();

    for (user, address) in [("u1", "A"), ("u2", "B")] {
        let joined = call(
            &app,
            "joinBatch",
            json!({ "batchId": batch_id, "userId": user, "quantity": 1, "shippingAddress": address }),
        )
        .await;
        assert_eq!(joined["result"]["status"], "pending");
    }

    let fetched = call(&app, "getBatch", json!({ "batchId": batch_id })).await;
    assert_eq!(fetched["result"]["status"], "ready");
    assert_eq!(fetched["result"]["currentBuyers"], 2);

    let processed = call(&app, "processBatch", json!({ "batchId": batch_id })).await;
    assert_eq!(processed["result"]["status"], "processing");

    let listed = call(&app, "listUserMemberships", json!({ "userId": "u1" })).await;
    let entries = listed["result"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["membership"]["status"], "confirmed");
}

#[tokio::test]
async fn test_unknown_batch_type_defaults_to_standard() {
    let engine = memory_engine();
    let app = router(engine.app_state());

    let created = call(
        &app,
        "createBatch",
        json!({ "productId": "P1", "batchType": "teleport", "price": 10.0, "buyersRequired": 3 }),
    )
    .await;
    assert_eq!(created["result"]["batchType"], "standard");
    assert_eq!(created["result"]["deliverySpeed"], "medium");
}

#[tokio::test]
async fn test_error_codes() {
    let engine = memory_engine();
    let app = router(engine.app_state());

    let unknown = call(&app, "launchRocket", json!({})).await;
    assert_eq!(error_code(&unknown), -32601);

    let bad_params = call(&app, "getBatch", json!({ "batchId": "not-a-uuid" })).await;
    assert_eq!(error_code(&bad_params), -32602);

    let missing = call(
        &app,
        "getBatch",
        json!({ "batchId": "00000000-0000-0000-0000-000000000000" }),
    )
    .await;
    assert_eq!(error_code(&missing), -32004);

    let created = call(
        &app,
        "createBatch",
        json!({ "productId": "P1", "batchType": "fast", "price": 10.0, "buyersRequired": 2 }),
    )
    .await;
    let batch_id = created["result"]["id"].clone();
    let premature = call(&app, "processBatch", json!({ "batchId": batch_id })).await;
    assert_eq!(error_code(&premature), -32009);

    let invalid = call(
        &app,
        "joinBatch",
        json!({ "batchId": batch_id, "userId": "u1", "quantity": 1, "shippingAddress": "" }),
    )
    .await;
    assert_eq!(error_code(&invalid), -32602);
    assert!(invalid.get("result").is_none());
}

#[tokio::test]
async fn test_update_deactivate_and_analytics() {
    let engine = memory_engine();
    let app = router(engine.app_state());

    let created = call(
        &app,
        "createBatch",
        json!({ "productId": "P1", "batchType": "economy", "price": 10.0, "buyersRequired": 5 }),
    )
    .await;
    let batch_id = created["result"]["id"].clone();

    let updated = call(
        &app,
        "updateBatch",
        json!({ "batchId": batch_id, "updates": { "discount": 2.5 } }),
    )
    .await;
    assert_eq!(updated["result"]["discount"], 2.5);

    let retired = call(&app, "deactivateBatch", json!({ "batchId": batch_id })).await;
    assert_eq!(retired["result"]["isActive"], false);

    let listed = call(&app, "listBatches", json!({ "productId": "P1" })).await;
    assert!(listed["result"].as_array().unwrap().is_empty());

    let analytics = call(&app, "getBatchAnalytics", json!({ "productId": "P1" })).await;
    assert_eq!(analytics["result"]["totalBatches"], 1);
    assert_eq!(analytics["result"]["activeBatches"], 0);

    // No active capacity left, so demand is balanced
    let auto = call(&app, "autoCreateBatches", json!({ "productId": "P1" })).await;
    assert_eq!(auto["result"], Value::Null);
    assert!(auto.get("error").is_none());
}
