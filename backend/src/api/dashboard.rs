use axum::{extract::State, Json};
use chrono::Utc;

use super::error::{ApiResult, StoreResultExt};
use super::AppState;
use crate::models::DashboardStats;

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let properties = state
        .storage
        .get_properties()
        .await
        .or_fail("Failed to fetch dashboard stats")?;
    let proposals = state
        .storage
        .get_voting_proposals()
        .await
        .or_fail("Failed to fetch dashboard stats")?;
    Ok(Json(DashboardStats::compute(&properties, &proposals, Utc::now())))
}
