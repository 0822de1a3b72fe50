use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{GoalRequest, GoalResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_contract_group;
use crate::types::Goal;

fn validate_month(month: &str) -> Result<String, ApiError> {
    let trimmed = month.trim();
    let bytes = trimmed.as_bytes();
    let valid = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit);
    if !valid {
        return Err(ApiError::bad_request("Month must be in YYYY-MM format"));
    }
    Ok(trimmed.to_string())
}

pub async fn list_goals(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let goals = state.store.list_goals().api_err("Failed to list goals")?;

    let mut responses = Vec::with_capacity(goals.len());
    for goal in goals {
        let service = state
            .store
            .get_service(&goal.service_id)
            .api_err("Failed to get service")?;
        responses.push(GoalResponse {
            id: goal.id,
            contract_group: goal.contract_group,
            month: goal.month,
            target_area: goal.target_area,
            service_id: goal.service_id,
            service,
        });
    }

    Ok(Json(ApiResponse::success(responses)))
}

pub async fn create_goal(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<GoalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let contract_group = validate_contract_group(&req.contract_group)?;
    let month = validate_month(&req.month)?;

    let service = state
        .store
        .get_service(&req.service_id)
        .api_err("Failed to get service")?
        .or_not_found("Service not found")?;

    let goal = Goal {
        id: Uuid::new_v4().to_string(),
        contract_group,
        month,
        target_area: req.target_area,
        service_id: service.id.clone(),
    };

    state
        .store
        .create_goal(&goal)
        .api_err("Failed to create goal")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(GoalResponse {
            id: goal.id,
            contract_group: goal.contract_group,
            month: goal.month,
            target_area: goal.target_area,
            service_id: goal.service_id,
            service: Some(service),
        })),
    ))
}

pub async fn update_goal(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<GoalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut goal = state
        .store
        .get_goal(&id)
        .api_err("Failed to get goal")?
        .or_not_found("Goal not found")?;

    let service = state
        .store
        .get_service(&req.service_id)
        .api_err("Failed to get service")?
        .or_not_found("Service not found")?;

    goal.contract_group = validate_contract_group(&req.contract_group)?;
    goal.month = validate_month(&req.month)?;
    goal.target_area = req.target_area;
    goal.service_id = service.id.clone();

    state
        .store
        .update_goal(&goal)
        .api_err("Failed to update goal")?;

    Ok(Json(ApiResponse::success(GoalResponse {
        id: goal.id,
        contract_group: goal.contract_group,
        month: goal.month,
        target_area: goal.target_area,
        service_id: goal.service_id,
        service: Some(service),
    })))
}

pub async fn delete_goal(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .store
        .delete_goal(&id)
        .api_err("Failed to delete goal")?;

    if !deleted {
        return Err(ApiError::not_found("Goal not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
