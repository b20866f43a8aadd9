use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::stock::{NewPackagingRule, PackagingRule, RuleId};
use crate::{ApiResponse, AppState};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SetRuleActiveRequest {
    pub is_active: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/packaging-rules",
    summary = "List packaging rules",
    responses(
        (status = 200, description = "All rules, active and inactive", body = ApiResponse<Vec<PackagingRule>>),
    ),
    tag = "packaging"
)]
pub async fn list_rules(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PackagingRule>>>, ServiceError> {
    let rules = state.services.packaging_rules.list().await?;
    Ok(Json(ApiResponse::success(rules)))
}

#[utoipa::path(
    post,
    path = "/api/v1/packaging-rules",
    summary = "Create packaging rule",
    request_body = NewPackagingRule,
    responses(
        (status = 201, description = "Rule created", body = ApiResponse<PackagingRule>),
        (status = 400, description = "Invalid rule", body = crate::errors::ErrorResponse),
    ),
    tag = "packaging"
)]
pub async fn create_rule(
    State(state): State<AppState>,
    Json(request): Json<NewPackagingRule>,
) -> Result<(StatusCode, Json<ApiResponse<PackagingRule>>), ServiceError> {
    let rule = state.services.packaging_rules.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(rule))))
}

#[utoipa::path(
    put,
    path = "/api/v1/packaging-rules/{id}/active",
    summary = "Activate or deactivate a packaging rule",
    params(("id" = i32, Path, description = "Rule ID")),
    request_body = SetRuleActiveRequest,
    responses(
        (status = 200, description = "Updated rule", body = ApiResponse<PackagingRule>),
        (status = 404, description = "Rule not found", body = crate::errors::ErrorResponse),
    ),
    tag = "packaging"
)]
pub async fn set_rule_active(
    State(state): State<AppState>,
    Path(id): Path<RuleId>,
    Json(request): Json<SetRuleActiveRequest>,
) -> Result<Json<ApiResponse<PackagingRule>>, ServiceError> {
    let rule = state
        .services
        .packaging_rules
        .set_active(id, request.is_active)
        .await?;
    Ok(Json(ApiResponse::success(rule)))
}
