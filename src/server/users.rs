use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{Credentials, RequireAdmin};
use crate::server::AppState;
use crate::server::dto::{CreateUserRequest, UpdateUserRequest, user_to_response};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_assignments, validate_email};
use crate::types::User;

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.store.list_users().api_err("Failed to list users")?;

    let responses: Vec<_> = users.iter().map(user_to_response).collect();
    Ok(Json(ApiResponse::success(responses)))
}

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&req.email)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }

    let existing = state
        .store
        .get_user_by_email(&email)
        .api_err("Failed to check e-mail")?;
    if existing.is_some() {
        return Err(ApiError::conflict("A user with this e-mail already exists"));
    }

    let assignments = match &req.assignments {
        Some(value) => validate_assignments(value)?,
        None => "[]".to_string(),
    };

    let password_hash = Credentials::new()
        .hash(&req.password)
        .map_err(|_| ApiError::internal("Failed to hash password"))?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        name: req.name.trim().to_string(),
        password_hash,
        role: req.role,
        assignments,
        version: 0,
        reset_token: None,
        reset_token_expires: None,
        created_at: now,
        updated_at: now,
    };

    state
        .store
        .create_user(&user)
        .api_err("Failed to create user")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(user_to_response(&user))),
    ))
}

pub async fn update_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    if let Some(email) = &req.email {
        user.email = validate_email(email)?;
    }
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("Name cannot be empty"));
        }
        user.name = name.trim().to_string();
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(password) = &req.password {
        if password.is_empty() {
            return Err(ApiError::bad_request("Password cannot be empty"));
        }
        user.password_hash = Credentials::new()
            .hash(password)
            .map_err(|_| ApiError::internal("Failed to hash password"))?;
    }
    if let Some(assignments) = &req.assignments {
        let serialized = validate_assignments(assignments)?;
        if serialized != user.assignments {
            user.assignments = serialized;
            user.version += 1;
        }
    }

    state
        .store
        .update_user(&user)
        .api_err("Failed to update user")?;

    Ok(Json(ApiResponse::success(user_to_response(&user))))
}

pub async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if admin.id == id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    // Records keep their denormalized operator_name; the FK goes NULL.
    state
        .store
        .delete_user(&user.id)
        .api_err("Failed to delete user")?;

    Ok(StatusCode::NO_CONTENT)
}
