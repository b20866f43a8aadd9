//! Stock Ledger library
//!
//! Order-driven stock engine for a skincare storefront back-office: BOM
//! consumption, packaging rules, the packaging deduction ledger and
//! restoration on cancellation or deletion.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod stock;
pub mod tracing;

use axum::{
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use http::HeaderValue;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::ToSchema;

use crate::events::EventSender;
use crate::stock::StockBackend;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub backend: Arc<dyn StockBackend>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        config: config::AppConfig,
        backend: Arc<dyn StockBackend>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let services = handlers::AppServices::new(backend.clone(), event_sender);
        Self {
            config,
            backend,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn response_meta_is_omitted_outside_a_request() {
        let response = ApiResponse::success(1);
        let meta = response.meta.expect("metadata expected");
        assert!(meta.request_id.is_none());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{materials, orders, packaging_rules, reports};

    Router::new()
        .route("/status", get(api_status))
        // Orders
        .route("/orders/:id", delete(orders::delete_order))
        .route("/orders/:id/status", put(orders::update_order_status))
        .route("/orders/:id/stock/consume", post(orders::consume_order_stock))
        .route("/orders/:id/stock/restore", post(orders::restore_order_stock))
        .route("/orders/:id/packaging/deduct", post(orders::deduct_packaging))
        .route("/orders/:id/packaging/restore", post(orders::restore_packaging))
        // Materials
        .route("/materials", get(materials::list_materials))
        .route("/materials/:id", get(materials::get_material))
        .route("/materials/:id/adjust", post(materials::adjust_material))
        // Packaging rules
        .route(
            "/packaging-rules",
            get(packaging_rules::list_rules).post(packaging_rules::create_rule),
        )
        .route(
            "/packaging-rules/:id/active",
            put(packaging_rules::set_rule_active),
        )
        // Reports
        .route(
            "/reports/business-analysis",
            get(reports::business_analysis),
        )
}

async fn api_status() -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))))
}

/// CORS policy from config: explicit origins win, otherwise permissive when
/// the environment allows it, otherwise same-origin only.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

/// Full application router: health, the v1 API, Swagger UI and the
/// request-id, tracing and CORS layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(|| async { "stock-ledger up" }))
        .nest("/api/v1", api_v1_routes())
        .with_state(state.clone())
        .merge(health::health_routes(state.backend.clone()))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
}
