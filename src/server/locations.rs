use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::auth::{RequireAdmin, RequireAuth};
use crate::server::AppState;
use crate::server::dto::{
    LocationRequest, LocationResponse, ServiceMeasurementInput, location_to_response,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_contract_group, validate_measurement};
use crate::types::{Location, ServiceMeasurement};

/// Resolves the measurement inputs against the catalog, rejecting unknown
/// services before anything is written.
pub(super) async fn resolve_measurements(
    state: &Arc<AppState>,
    inputs: &[ServiceMeasurementInput],
) -> Result<(Vec<(String, f64)>, Vec<ServiceMeasurement>), ApiError> {
    let mut pairs = Vec::with_capacity(inputs.len());
    let mut details = Vec::with_capacity(inputs.len());

    for input in inputs {
        let measurement = validate_measurement(input.measurement)?;
        let service = state
            .store
            .get_service(&input.service_id)
            .api_err("Failed to get service")?
            .or_not_found("Service not found")?;
        let unit = state
            .store
            .get_unit(&service.unit_id)
            .api_err("Failed to get unit")?
            .or_not_found("Unit not found for service")?;

        pairs.push((service.id.clone(), measurement));
        details.push(ServiceMeasurement {
            service_id: service.id,
            name: service.name,
            measurement,
            unit,
        });
    }

    Ok((pairs, details))
}

pub async fn list_locations(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let locations = state
        .store
        .list_locations()
        .api_err("Failed to list locations")?;

    let responses: Vec<LocationResponse> = locations.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(responses)))
}

pub async fn create_location(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let city = validate_contract_group(&req.contract_group)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Location name is required"));
    }

    let (pairs, details) = resolve_measurements(&state, &req.services).await?;

    let location = Location {
        id: Uuid::new_v4().to_string(),
        city,
        name: req.name.trim().to_string(),
        lat: req.lat,
        lng: req.lng,
        observations: req.observations.clone(),
        is_group: false,
        parent_id: None,
    };

    state
        .store
        .create_location(&location, &pairs)
        .api_err("Failed to create location")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(location_to_response(location, details))),
    ))
}

pub async fn update_location(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<LocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let city = validate_contract_group(&req.contract_group)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Location name is required"));
    }

    let mut location = state
        .store
        .get_location(&id)
        .api_err("Failed to get location")?
        .or_not_found("Location not found")?;

    let (pairs, details) = resolve_measurements(&state, &req.services).await?;

    location.city = city;
    location.name = req.name.trim().to_string();
    location.lat = req.lat;
    location.lng = req.lng;
    location.observations = req.observations.clone();

    // Full replace: prior measurement rows are dropped and the new set is
    // written in the same transaction.
    state
        .store
        .update_location(&location, &pairs)
        .api_err("Failed to update location")?;

    Ok(Json(ApiResponse::success(location_to_response(
        location, details,
    ))))
}

pub async fn delete_location(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .store
        .delete_location(&id)
        .api_err("Failed to delete location")?;

    if !deleted {
        return Err(ApiError::not_found("Location not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
