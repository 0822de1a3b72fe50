use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::{RequireAdmin, RequireAuth};
use crate::server::AppState;
use crate::server::dto::{MessageResponse, UpsertContractConfigsRequest};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{validate_contract_group, validate_cycle_start_day};

pub async fn list_configs(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let configs = state
        .store
        .list_contract_configs()
        .api_err("Failed to list contract configs")?;
    Ok(Json(ApiResponse::success(configs)))
}

/// Batch upsert: one transaction for the whole set.
pub async fn upsert_configs(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertContractConfigsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.configs.is_empty() {
        return Err(ApiError::bad_request("At least one config is required"));
    }

    let mut pairs = Vec::with_capacity(req.configs.len());
    for config in &req.configs {
        let group = validate_contract_group(&config.contract_group)?;
        let day = validate_cycle_start_day(config.cycle_start_day)?;
        pairs.push((group, day));
    }

    state
        .store
        .upsert_contract_configs(&pairs)
        .api_err("Failed to save contract configs")?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Contract configs saved successfully.".to_string(),
    })))
}
