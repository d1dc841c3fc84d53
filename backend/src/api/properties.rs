use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use log::info;

use super::error::{ApiError, ApiResult, StoreResultExt};
use super::AppState;
use crate::models::{NewProperty, Property};

/// Fetches every listed property in listing order
pub async fn list_properties(State(state): State<AppState>) -> ApiResult<Json<Vec<Property>>> {
    let properties = state
        .storage
        .get_properties()
        .await
        .or_fail("Failed to fetch properties")?;
    info!("Fetched {} properties", properties.len());
    Ok(Json(properties))
}

/// Fetches a specific property by its ID
pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Property>> {
    info!("Fetching property with ID: {}", id);
    state
        .storage
        .get_property(&id)
        .await
        .or_fail("Failed to fetch property")?
        .map(Json)
        .ok_or(ApiError::NotFound("Property not found"))
}

/// Lists a new property. Token counts, income and valuation come from the store.
pub async fn create_property(
    State(state): State<AppState>,
    payload: Result<Json<NewProperty>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Property>)> {
    let Json(new_property) =
        payload.map_err(|e| ApiError::invalid_json("Invalid property data", e))?;
    let property = state
        .storage
        .create_property(new_property)
        .await
        .or_fail("Failed to create property")?;
    info!("Listed property {} ({})", property.id, property.name);
    Ok((StatusCode::CREATED, Json(property)))
}
