use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::services::business_analysis::BusinessAnalysis;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct AnalysisRangeQuery {
    /// Range start, RFC 3339
    pub from: DateTime<Utc>,
    /// Range end (inclusive), RFC 3339
    pub to: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/business-analysis",
    summary = "Business analysis",
    description = "Revenue, COGS (BOM materials plus recorded packaging), gross and net profit for orders created in the range",
    params(AnalysisRangeQuery),
    responses(
        (status = 200, description = "Analysis", body = ApiResponse<BusinessAnalysis>),
        (status = 400, description = "Invalid range", body = crate::errors::ErrorResponse),
    ),
    tag = "reports"
)]
pub async fn business_analysis(
    State(state): State<AppState>,
    Query(range): Query<AnalysisRangeQuery>,
) -> Result<Json<ApiResponse<BusinessAnalysis>>, ServiceError> {
    let analysis = state
        .services
        .business_analysis
        .analyze(range.from, range.to)
        .await?;
    Ok(Json(ApiResponse::success(analysis)))
}
