use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::services::materials::AdjustMaterialRequest;
use crate::stock::{Material, MaterialId};
use crate::{ApiResponse, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MaterialListQuery {
    /// Only materials at or below their low-stock threshold
    #[serde(default)]
    pub low_stock: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/materials",
    summary = "List materials",
    params(MaterialListQuery),
    responses(
        (status = 200, description = "Materials", body = ApiResponse<Vec<Material>>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<MaterialListQuery>,
) -> Result<Json<ApiResponse<Vec<Material>>>, ServiceError> {
    let materials = state.services.materials.list(query.low_stock).await?;
    Ok(Json(ApiResponse::success(materials)))
}

#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}",
    summary = "Get material",
    params(("id" = i32, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Material", body = ApiResponse<Material>),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse),
    ),
    tag = "materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<MaterialId>,
) -> Result<Json<ApiResponse<Material>>, ServiceError> {
    let material = state.services.materials.get(id).await?;
    Ok(Json(ApiResponse::success(material)))
}

#[utoipa::path(
    post,
    path = "/api/v1/materials/{id}/adjust",
    summary = "Adjust material stock",
    description = "Manual correction; the result is floored at zero",
    params(("id" = i32, Path, description = "Material ID")),
    request_body = AdjustMaterialRequest,
    responses(
        (status = 200, description = "Material after adjustment", body = ApiResponse<Material>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse),
    ),
    tag = "materials"
)]
pub async fn adjust_material(
    State(state): State<AppState>,
    Path(id): Path<MaterialId>,
    Json(request): Json<AdjustMaterialRequest>,
) -> Result<Json<ApiResponse<Material>>, ServiceError> {
    let material = state.services.materials.adjust(id, request).await?;
    Ok(Json(ApiResponse::success(material)))
}
