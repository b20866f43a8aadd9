#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use stock_ledger::{
    config::AppConfig,
    events::{Event, EventSender},
    handlers::AppServices,
    repositories::{MemoryState, MemoryStore},
    stock::{
        AppliesTo, DeductionType, MaterialId, NewPackagingRule, OrderId, OrderLine, OrderStatus,
        StockBackend,
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Services wired to a seeded in-memory backend. Events are buffered on
/// `events` so tests can inspect them.
pub struct TestHarness {
    pub store: MemoryStore,
    pub services: AppServices,
    pub events: mpsc::Receiver<Event>,
}

impl TestHarness {
    pub fn new(state: MemoryState) -> Self {
        let store = MemoryStore::new(state);
        let backend: Arc<dyn StockBackend> = Arc::new(store.clone());
        let (tx, rx) = mpsc::channel(256);
        let services = AppServices::new(backend, Arc::new(EventSender::new(tx)));
        Self {
            store,
            services,
            events: rx,
        }
    }

    pub async fn material_stock(&self, material_id: MaterialId) -> Decimal {
        self.store
            .snapshot()
            .await
            .material_stock(material_id)
            .expect("material exists")
    }

    pub async fn product_stock(&self, product_id: i32) -> i32 {
        self.store.snapshot().await.product_stock[&product_id]
    }

    pub async fn variant_stock(&self, variant_id: i32) -> i32 {
        self.store.snapshot().await.variant_stock[&variant_id]
    }

    pub async fn ledger_len(&self, order_id: OrderId) -> usize {
        self.store.snapshot().await.ledger_for(order_id).len()
    }

    pub async fn order_status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.store
            .snapshot()
            .await
            .orders
            .get(&order_id)
            .map(|order| order.status)
    }

    /// Events sent so far, without waiting for more.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn product_line(order_id: OrderId, product_id: i32, quantity: i32) -> OrderLine {
    OrderLine {
        order_id,
        product_id: Some(product_id),
        variant_id: None,
        quantity,
        unit_price: dec!(10),
    }
}

pub fn variant_line(order_id: OrderId, product_id: i32, variant_id: i32, quantity: i32) -> OrderLine {
    OrderLine {
        order_id,
        product_id: Some(product_id),
        variant_id: Some(variant_id),
        quantity,
        unit_price: dec!(10),
    }
}

pub fn rule_for_all(
    material_id: MaterialId,
    deduction_type: DeductionType,
    quantity_single: Decimal,
    quantity_multiple: Decimal,
) -> NewPackagingRule {
    NewPackagingRule {
        name: "Shipping box".to_string(),
        is_active: true,
        applies_to: AppliesTo::All,
        target_product_ids: Vec::new(),
        material_id,
        deduction_type,
        quantity_single,
        quantity_multiple,
    }
}

pub fn pending_order(state: &mut MemoryState, number: &str) -> OrderId {
    state.add_order(number, OrderStatus::Pending, dec!(100), Utc::now())
}

/// Router over a seeded in-memory backend, in the development environment.
pub fn test_router(state: MemoryState) -> (Router, MemoryStore) {
    let store = MemoryStore::new(state);
    let backend: Arc<dyn StockBackend> = Arc::new(store.clone());
    let (tx, mut rx) = mpsc::channel(256);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "development".to_string(),
    );
    cfg.backend = "memory".to_string();

    let app_state = AppState::new(cfg, backend, Arc::new(EventSender::new(tx)));
    (stock_ledger::build_router(app_state), store)
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    router.clone().oneshot(request).await.expect("response")
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
