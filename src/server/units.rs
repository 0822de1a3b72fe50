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
use crate::server::dto::UnitRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::Unit;

pub async fn list_units(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let units = state.store.list_units().api_err("Failed to list units")?;
    Ok(Json(ApiResponse::success(units)))
}

pub async fn create_unit(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UnitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() || req.symbol.trim().is_empty() {
        return Err(ApiError::bad_request("Name and symbol are required"));
    }

    let unit = Unit {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        symbol: req.symbol.trim().to_string(),
    };

    state
        .store
        .create_unit(&unit)
        .api_err("Failed to create unit")?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(unit))))
}

pub async fn update_unit(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UnitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() || req.symbol.trim().is_empty() {
        return Err(ApiError::bad_request("Name and symbol are required"));
    }

    let mut unit = state
        .store
        .get_unit(&id)
        .api_err("Failed to get unit")?
        .or_not_found("Unit not found")?;

    unit.name = req.name.trim().to_string();
    unit.symbol = req.symbol.trim().to_string();

    state
        .store
        .update_unit(&unit)
        .api_err("Failed to update unit")?;

    Ok(Json(ApiResponse::success(unit)))
}

pub async fn delete_unit(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .store
        .delete_unit(&id)
        .api_err("Failed to delete unit")?;

    if !deleted {
        return Err(ApiError::not_found("Unit not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
