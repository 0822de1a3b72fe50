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
use crate::server::dto::{ServiceRequest, service_to_response};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::Service;

pub async fn list_services(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let services = state
        .store
        .list_services()
        .api_err("Failed to list services")?;

    let mut responses = Vec::with_capacity(services.len());
    for service in services {
        let unit = state
            .store
            .get_unit(&service.unit_id)
            .api_err("Failed to get unit")?
            .or_not_found("Unit not found for service")?;
        responses.push(service_to_response(service, unit));
    }

    Ok(Json(ApiResponse::success(responses)))
}

pub async fn create_service(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ServiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Service name is required"));
    }

    let unit = state
        .store
        .get_unit(&req.unit_id)
        .api_err("Failed to get unit")?
        .or_not_found("Unit not found")?;

    let service = Service {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        unit_id: unit.id.clone(),
    };

    state
        .store
        .create_service(&service)
        .api_err("Failed to create service")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(service_to_response(service, unit))),
    ))
}

pub async fn update_service(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ServiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Service name is required"));
    }

    let mut service = state
        .store
        .get_service(&id)
        .api_err("Failed to get service")?
        .or_not_found("Service not found")?;

    let unit = state
        .store
        .get_unit(&req.unit_id)
        .api_err("Failed to get unit")?
        .or_not_found("Unit not found")?;

    service.name = req.name.trim().to_string();
    service.unit_id = unit.id.clone();

    state
        .store
        .update_service(&service)
        .api_err("Failed to update service")?;

    Ok(Json(ApiResponse::success(service_to_response(service, unit))))
}

pub async fn delete_service(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .store
        .delete_service(&id)
        .api_err("Failed to delete service")?;

    if !deleted {
        return Err(ApiError::not_found("Service not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
