use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::CreateAuditEntryRequest;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::{AuditEntry, User};

/// Writes an audit entry for an admin action. Audit failures are logged, not
/// surfaced: the primary write has already committed.
pub(super) fn record_action(
    state: &Arc<AppState>,
    admin: &User,
    action: &str,
    record_id: Option<String>,
    details: String,
) {
    let entry = AuditEntry {
        id: Uuid::new_v4().to_string(),
        admin_id: admin.id.clone(),
        admin_username: admin.name.clone(),
        action: action.to_string(),
        record_id,
        details,
        timestamp: Utc::now(),
    };

    if let Err(e) = state.store.append_audit(&entry) {
        tracing::warn!("Failed to write audit entry '{}': {e}", entry.action);
    }
}

pub async fn list_entries(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .store
        .list_audit()
        .api_err("Failed to list audit log")?;
    Ok(Json(ApiResponse::success(entries)))
}

pub async fn create_entry(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAuditEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.action.trim().is_empty() || req.details.trim().is_empty() {
        return Err(ApiError::bad_request("Action and details are required"));
    }

    let entry = AuditEntry {
        id: Uuid::new_v4().to_string(),
        admin_id: admin.id.clone(),
        admin_username: admin.name.clone(),
        action: req.action.trim().to_string(),
        record_id: req.record_id,
        details: req.details,
        timestamp: Utc::now(),
    };

    state
        .store
        .append_audit(&entry)
        .api_err("Failed to write audit entry")?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}
