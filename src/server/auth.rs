use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{Credentials, RequireAuth, generate_reset_token};
use crate::server::AppState;
use crate::server::dto::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, ResetPasswordRequest,
    user_to_response,
};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::validate_email;
use crate::types::Session;

const SESSION_LIFETIME_DAYS: i64 = 30;
const RESET_TOKEN_LIFETIME_MINUTES: i64 = 30;
const MAX_LOOKUP_RETRIES: u32 = 3;

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("E-mail and password are required"));
    }

    let credentials = Credentials::new();
    let user = state
        .store
        .get_user_by_email(req.email.trim())
        .api_err("Failed to look up user")?
        .filter(|user| {
            credentials
                .verify(&req.password, &user.password_hash)
                .unwrap_or(false)
        })
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    for _ in 0..MAX_LOOKUP_RETRIES {
        let (raw_token, lookup, hash) = credentials
            .generate_session_token()
            .map_err(|_| ApiError::internal("Failed to generate session token"))?;

        let collision = state
            .store
            .get_session_by_lookup(&lookup)
            .api_err("Failed to check session lookup")?;
        if collision.is_some() {
            continue;
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            user_id: user.id.clone(),
            created_at: Utc::now(),
            expires_at: Some(Utc::now() + Duration::days(SESSION_LIFETIME_DAYS)),
            last_used_at: None,
        };

        state
            .store
            .create_session(&session)
            .api_err("Failed to create session")?;

        return Ok(Json(ApiResponse::success(LoginResponse {
            access_token: raw_token,
            user: user_to_response(&user),
        })));
    }

    Err(ApiError::internal("Failed to create session after retries"))
}

pub async fn me(RequireAuth(user): RequireAuth) -> impl IntoResponse {
    Json(ApiResponse::success(user_to_response(&user)))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&req.email)?;

    // The response never reveals whether the account exists.
    let generic = MessageResponse {
        message: "If the e-mail exists, reset instructions have been sent.".to_string(),
    };

    let Some(user) = state
        .store
        .get_user_by_email(&email)
        .api_err("Failed to look up user")?
    else {
        return Ok(Json(ApiResponse::success(generic)));
    };

    let token = generate_reset_token();
    let expires = Utc::now() + Duration::minutes(RESET_TOKEN_LIFETIME_MINUTES);
    state
        .store
        .set_reset_token(&user.id, Some(&token), Some(expires))
        .api_err("Failed to store reset token")?;

    let base = state
        .frontend_url
        .as_deref()
        .unwrap_or("")
        .trim_end_matches('/');
    let reset_link = format!("{base}/reset-password?token={token}");

    state
        .mailer
        .send_password_reset(&user.email, &reset_link)
        .api_err("Failed to send reset e-mail")?;

    Ok(Json(ApiResponse::success(generic)))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.token.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Token and new password are required"));
    }

    let user = state
        .store
        .get_user_by_reset_token(req.token.trim())
        .api_err("Failed to look up reset token")?
        .filter(|user| {
            user.reset_token_expires
                .is_some_and(|expires| expires > Utc::now())
        })
        .ok_or_else(|| ApiError::bad_request("Invalid or expired token"))?;

    let hash = Credentials::new()
        .hash(&req.password)
        .map_err(|_| ApiError::internal("Failed to hash password"))?;

    state
        .store
        .update_password(&user.id, &hash)
        .api_err("Failed to update password")?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password reset successfully.".to_string(),
    })))
}
