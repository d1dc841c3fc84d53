use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use log::info;

use super::error::{ApiError, ApiResult, StoreResultExt};
use super::AppState;
use crate::models::{ReportFilter, ReportRequest, ValuationReport};

/// Report history, optionally narrowed with `?propertyId=`.
pub async fn list_reports(
    State(state): State<AppState>,
    filter: Result<Query<ReportFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<ValuationReport>>> {
    let Query(filter) =
        filter.map_err(|e| ApiError::invalid_query("Invalid report filter", e))?;
    let reports = match filter.property_id {
        Some(property_id) => state
            .storage
            .get_valuation_reports_by_property(&property_id)
            .await,
        None => state.storage.get_valuation_reports().await,
    }
    .or_fail("Failed to fetch valuation reports")?;
    Ok(Json(reports))
}

/// Appraises a property and stores the resulting report.
pub async fn generate_report(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ValuationReport>)> {
    let Json(request) =
        payload.map_err(|e| ApiError::invalid_json("Invalid report data", e))?;

    let property = state
        .storage
        .get_property(&request.property_id)
        .await
        .or_fail("Failed to generate valuation report")?
        .ok_or(ApiError::NotFound("Property not found"))?;

    let draft = state.valuation.appraise(&property);
    let report = state
        .storage
        .create_valuation_report(draft)
        .await
        .or_fail("Failed to generate valuation report")?;
    info!(
        "Generated valuation report {} for property {}: {} ({}% confidence)",
        report.id, report.property_id, report.valuation, report.confidence
    );
    Ok((StatusCode::CREATED, Json(report)))
}
