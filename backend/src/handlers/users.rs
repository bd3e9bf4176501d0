//! HTTP handlers for accounts and sessions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::User;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_admin, require_self_or_admin, CurrentUser};
use crate::services::auth::{AuthService, AuthTokens, EditDetailsInput, SignInResponse, SignUpInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
    /// Front-end base URL for the emailed link
    pub site: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

// ============================================================================
// Public endpoints
// ============================================================================

pub async fn sign_up(
    State(state): State<AppState>,
    Json(input): Json<SignUpInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = AuthService::new(&state).sign_up(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(input): Json<SignInRequest>,
) -> AppResult<Json<SignInResponse>> {
    let response = AuthService::new(&state)
        .sign_in(&input.email, &input.password)
        .await?;
    Ok(Json(response))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthTokens>> {
    let tokens = AuthService::new(&state).refresh(&input.refresh_token).await?;
    Ok(Json(tokens))
}

pub async fn sign_out(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<MessageResponse>> {
    AuthService::new(&state).sign_out(&input.refresh_token).await?;
    Ok(message("Signed out"))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(input): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    AuthService::new(&state).resend_verification(&input.email).await?;
    Ok(message("Verification email sent"))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(input): Json<TokenRequest>,
) -> AppResult<Json<User>> {
    let user = AuthService::new(&state).verify_email(&input.token).await?;
    Ok(Json(user))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    AuthService::new(&state)
        .forgot_password(&input.email, input.site.as_deref())
        .await?;
    Ok(message("Password reset email sent"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    AuthService::new(&state)
        .reset_password(&input.token, &input.password)
        .await?;
    Ok(message("Password has been reset"))
}

// ============================================================================
// Authenticated endpoints
// ============================================================================

/// The caller's own account
pub async fn profile(State(state): State<AppState>, current_user: CurrentUser) -> AppResult<Json<User>> {
    let user = AuthService::new(&state).profile(current_user.0.user_id).await?;
    Ok(Json(user))
}

pub async fn edit_details(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<EditDetailsInput>,
) -> AppResult<Json<User>> {
    require_self_or_admin(&current_user.0, user_id)?;
    let user = AuthService::new(&state).edit_details(user_id, input).await?;
    Ok(Json(user))
}

pub async fn list_users(State(state): State<AppState>, current_user: CurrentUser) -> AppResult<Json<Vec<User>>> {
    require_admin(&current_user.0)?;
    let users = AuthService::new(&state).list_users().await?;
    Ok(Json(users))
}

pub async fn admin_verify(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    require_admin(&current_user.0)?;
    let user = AuthService::new(&state).admin_verify(user_id).await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&current_user.0)?;
    AuthService::new(&state).delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
