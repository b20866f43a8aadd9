//! Router-level tests over the in-memory backend.

mod common;

use axum::http::{Method, StatusCode};
use common::{pending_order, product_line, response_json, rule_for_all, send, test_router};
use rust_decimal_macros::dec;
use serde_json::json;
use stock_ledger::repositories::MemoryState;
use stock_ledger::stock::{BomEntry, DeductionType};

#[tokio::test]
async fn health_reports_backend_up() {
    let (router, _store) = test_router(MemoryState::default());

    let response = send(&router, Method::GET, "/health/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["backend"], "up");
}

#[tokio::test]
async fn status_update_runs_packaging_and_reports_it() {
    let mut state = MemoryState::default();
    let box_id = state.add_material("Box", "unit", dec!(10), dec!(0.5), None);
    let product = state.add_product(5);
    state.add_rule(rule_for_all(box_id, DeductionType::PerOrder, dec!(1), dec!(2)));
    let order = pending_order(&mut state, "#400");
    state.add_line(product_line(order, product, 1));
    let (router, store) = test_router(state);

    let response = send(
        &router,
        Method::PUT,
        &format!("/api/v1/orders/{}/status", order),
        Some(json!({ "status": "processing" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["old_status"], "pending");
    assert_eq!(body["data"]["packaging"]["status"], "applied");
    assert_eq!(body["data"]["packaging"]["rules"][0]["outcome"], "deducted");
    assert_eq!(store.snapshot().await.material_stock(box_id), Some(dec!(9)));
}

#[tokio::test]
async fn invalid_transition_is_a_bad_request() {
    let mut state = MemoryState::default();
    let order = pending_order(&mut state, "#401");
    let (router, _store) = test_router(state);

    let response = send(
        &router,
        Method::PUT,
        &format!("/api/v1/orders/{}/status", order),
        Some(json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let (router, _store) = test_router(MemoryState::default());

    let response = send(&router, Method::DELETE, "/api/v1/orders/77", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restore_endpoint_returns_per_item_report() {
    let mut state = MemoryState::default();
    let wax = state.add_material("Wax", "g", dec!(100), dec!(0.02), None);
    let product = state.add_product(3);
    state.add_bom(BomEntry::for_product(product, wax, dec!(10)));
    let order = pending_order(&mut state, "#402");
    state.add_line(product_line(order, product, 2));
    let (router, store) = test_router(state);

    let response = send(
        &router,
        Method::POST,
        &format!("/api/v1/orders/{}/stock/restore", order),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["items"][0]["target"]["kind"], "product");
    assert_eq!(body["data"]["materials"][0]["outcome"], "ok");
    assert_eq!(store.snapshot().await.material_stock(wax), Some(dec!(120)));
}

#[tokio::test]
async fn materials_can_be_listed_and_adjusted() {
    let mut state = MemoryState::default();
    let low = state.add_material("Tape", "cm", dec!(5), dec!(0.01), Some(dec!(10)));
    state.add_material("Wax", "g", dec!(500), dec!(0.02), Some(dec!(10)));
    let (router, _store) = test_router(state);

    let response = send(&router, Method::GET, "/api/v1/materials?low_stock=true", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let listed = body["data"].as_array().expect("material list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], low);

    let response = send(
        &router,
        Method::POST,
        &format!("/api/v1/materials/{}/adjust", low),
        Some(json!({ "delta": "-50", "reason": "stocktake" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["stock_quantity"], "0");

    let response = send(
        &router,
        Method::POST,
        &format!("/api/v1/materials/{}/adjust", low),
        Some(json!({ "delta": "1", "reason": "" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn packaging_rules_can_be_created_and_toggled() {
    let mut state = MemoryState::default();
    let box_id = state.add_material("Box", "unit", dec!(10), dec!(0.5), None);
    let (router, _store) = test_router(state);

    let response = send(
        &router,
        Method::POST,
        "/api/v1/packaging-rules",
        Some(json!({
            "name": "Standard mailer",
            "applies_to": "all",
            "material_id": box_id,
            "deduction_type": "per_order",
            "quantity_single": "1",
            "quantity_multiple": "1"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let rule_id = body["data"]["id"].as_i64().expect("rule id");
    assert_eq!(body["data"]["is_active"], true);

    let response = send(
        &router,
        Method::PUT,
        &format!("/api/v1/packaging-rules/{}/active", rule_id),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["is_active"], false);

    let response = send(
        &router,
        Method::POST,
        "/api/v1/packaging-rules",
        Some(json!({
            "name": "Ghost",
            "applies_to": "all",
            "material_id": 9999,
            "deduction_type": "per_order",
            "quantity_single": "1",
            "quantity_multiple": "1"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn business_analysis_rejects_reversed_range() {
    let (router, _store) = test_router(MemoryState::default());

    let response = send(
        &router,
        Method::GET,
        "/api/v1/reports/business-analysis?from=2025-03-02T00:00:00Z&to=2025-03-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (router, _store) = test_router(MemoryState::default());

    let response = send(&router, Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(body["paths"]["/api/v1/orders/{id}/status"].is_object());
}
