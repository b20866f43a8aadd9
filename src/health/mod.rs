//! Liveness and readiness endpoints.
//!
//! - `/health` - process is up
//! - `/health/ready` - storage backend answers a ping

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use crate::stock::StockBackend;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<HealthStatus>,
}

#[derive(Clone)]
pub struct HealthState {
    backend: Arc<dyn StockBackend>,
    started: Instant,
}

impl HealthState {
    pub fn new(backend: Arc<dyn StockBackend>) -> Self {
        Self {
            backend,
            started: Instant::now(),
        }
    }

    fn info(&self, status: HealthStatus, backend: Option<HealthStatus>) -> HealthInfo {
        HealthInfo {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: self.started.elapsed().as_secs(),
            backend,
        }
    }
}

async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    Json(state.info(HealthStatus::Up, None))
}

async fn ready(State(state): State<HealthState>) -> impl IntoResponse {
    match state.backend.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(state.info(HealthStatus::Up, Some(HealthStatus::Up))),
        ),
        Err(e) => {
            error!(error = %e, "Backend health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(state.info(HealthStatus::Down, Some(HealthStatus::Down))),
            )
        }
    }
}

pub fn health_routes(backend: Arc<dyn StockBackend>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .with_state(HealthState::new(backend))
}
