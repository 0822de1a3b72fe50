use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::{Credentials, RequireAdmin};
use crate::server::AppState;
use crate::server::audit::record_action;
use crate::server::dto::{
    DeleteContractGroupRequest, MessageResponse, RenameContractGroupRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::validate_contract_group;

/// Renames a contract group everywhere the label is stored: location cities,
/// contract configs, service records and each user's embedded assignments.
/// The store applies all of it in one transaction; a rename onto an existing
/// label merges the two groups.
pub async fn rename_contract_group(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(old_name): Path<String>,
    Json(req): Json<RenameContractGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let old_name = validate_contract_group(&old_name)?;
    let new_name = validate_contract_group(&req.new_name)?;

    let outcome = state
        .store
        .rename_contract_group(&old_name, &new_name)
        .api_err("Failed to rename contract group")?;

    record_action(
        &state,
        &admin,
        "CONTRACT_GROUP_RENAMED",
        None,
        format!(
            "Renamed '{old_name}' to '{new_name}' ({} location(s), {} config(s), \
             {} record(s), {} user(s))",
            outcome.locations, outcome.configs, outcome.records, outcome.users
        ),
    );

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Contract group '{old_name}' renamed to '{new_name}' successfully."),
    })))
}

/// Deletes a contract group and its locations after re-authenticating the
/// acting admin. Refused outright while any service record still carries the
/// label; the guard and the deletes run in the same transaction.
pub async fn delete_contract_group(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<DeleteContractGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate_contract_group(&name)?;
    if req.password.is_empty() {
        return Err(ApiError::bad_request("Administrative password is required"));
    }

    let verified = Credentials::new()
        .verify(&req.password, &admin.password_hash)
        .map_err(|_| ApiError::internal("Failed to verify password"))?;
    if !verified {
        return Err(ApiError::unauthorized("Incorrect password"));
    }

    let outcome = state
        .store
        .delete_contract_group(&name)
        .api_err("Failed to delete contract group")?;

    record_action(
        &state,
        &admin,
        "CONTRACT_GROUP_DELETED",
        None,
        format!(
            "Deleted '{name}' ({} location(s), {} config(s), {} user(s) unassigned)",
            outcome.locations, outcome.configs, outcome.users
        ),
    );

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Contract group '{name}' and its locations were deleted successfully."),
    })))
}
