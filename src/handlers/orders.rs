use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::services::order_lifecycle::{OrderDeletion, StatusChange};
use crate::stock::{OrderId, OrderStatus, OrderStockReport, PackagingReport};
use crate::{ApiResponse, AppState};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Move an order to a new status
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Entering processing deducts packaging materials; entering cancelled restores all order stock",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<StatusChange>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<StatusChange>>, ServiceError> {
    let change = state
        .services
        .order_lifecycle
        .update_status(id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(change)))
}

/// Delete an order
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    description = "Restores the order's stock unless it was already cancelled, then deletes the order and its lines",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order deleted", body = ApiResponse<OrderDeletion>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<OrderDeletion>>, ServiceError> {
    let deletion = state.services.order_lifecycle.delete_order(id).await?;
    Ok(Json(ApiResponse::success(deletion)))
}

/// Consume item and BOM stock for a purchased order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/stock/consume",
    summary = "Consume order stock",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Per-item consumption report", body = ApiResponse<OrderStockReport>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn consume_order_stock(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<OrderStockReport>>, ServiceError> {
    let report = state.services.stock_engine.consume_order_stock(id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Restore item, BOM and packaging stock for an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/stock/restore",
    summary = "Restore order stock",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Per-item restoration report", body = ApiResponse<OrderStockReport>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn restore_order_stock(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<OrderStockReport>>, ServiceError> {
    let report = state.services.stock_engine.restore_order_stock(id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Apply packaging rules to an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/packaging/deduct",
    summary = "Deduct packaging",
    description = "Idempotent per order while ledger entries exist",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Per-rule deduction report", body = ApiResponse<PackagingReport>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn deduct_packaging(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<PackagingReport>>, ServiceError> {
    let report = state.services.stock_engine.deduct_packaging(id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Return ledger-recorded packaging to stock
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/packaging/restore",
    summary = "Restore packaging",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Packaging restoration report", body = ApiResponse<OrderStockReport>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn restore_packaging(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<OrderStockReport>>, ServiceError> {
    let report = state
        .services
        .stock_engine
        .restore_packaging_for_order(id)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}
