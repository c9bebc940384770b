/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/auth/register` - Create an account and open a session
/// - `POST /api/v1/auth/login` - Exchange credentials for a token pair
/// - `POST /api/v1/auth/refresh-token` - Rotate a refresh token
/// - `POST /api/v1/auth/logout` - Revoke the current refresh token
/// - `GET /api/v1/auth/me` - Current user's profile
/// - `PATCH /api/v1/auth/me` - Update name and/or email
/// - `POST /api/v1/auth/change-password` - Replace the password, re-issue tokens

use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    response::ApiResponse,
    routes::{validate_name, validate_new_password},
};
use taskdeck_shared::auth::jwt::TokenPair;
use taskdeck_shared::auth::principal::Principal;
use taskdeck_shared::auth::session::{AuthSession, Registration};
use taskdeck_shared::models::user::{Role, UserChanges, UserProfile};

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,

    #[validate(custom(function = "validate_new_password"))]
    pub password: String,

    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(custom(function = "validate_new_password"))]
    pub new_password: String,
}

/// `data` payload for profile endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: UserProfile,
}

/// Register a new user
///
/// Returns 201 with `{user, accessToken, refreshToken}`. The email is
/// matched case-insensitively against every account, deactivated ones
/// included; a match is a 409.
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<ApiResponse<AuthSession>> {
    let session = state
        .sessions
        .register(Registration {
            name: req.name,
            email: req.email,
            password: req.password,
            role: req.role,
        })
        .await?;

    Ok(ApiResponse::created("Registration successful", session))
}

/// Log in with email and password
///
/// Unknown email and wrong password produce the same 401. A correct
/// password on a deactivated account is a 403.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthSession>> {
    let session = state.sessions.login(&req.email, &req.password).await?;
    Ok(ApiResponse::ok("Login successful", session))
}

/// Exchange a refresh token for a new pair
///
/// The presented token is consumed; presenting it again is a 401.
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> ApiResult<ApiResponse<TokenPair>> {
    let token = req.refresh_token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("Refresh token is required".to_string()));
    }

    let pair = state.sessions.refresh(token).await?;
    Ok(ApiResponse::ok("Tokens refreshed successfully", pair))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ApiResponse<()>> {
    state.sessions.logout(principal.id).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ApiResponse<UserData>> {
    let user = state.sessions.profile(principal.id).await?;
    Ok(ApiResponse::ok("Success", UserData { user }))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> ApiResult<ApiResponse<UserData>> {
    let user = state
        .sessions
        .update_profile(
            principal.id,
            UserChanges {
                name: req.name,
                email: req.email,
            },
        )
        .await?;

    Ok(ApiResponse::ok("Profile updated successfully", UserData { user }))
}

/// Change the caller's password
///
/// Every access token issued before the change stops working and the stored
/// refresh token is replaced by the one returned here.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<AuthSession>> {
    let session = state
        .sessions
        .change_password(principal.id, &req.current_password, &req.new_password)
        .await?;

    info!(user_id = %principal.id, "Password changed via API");
    Ok(ApiResponse::ok("Password changed successfully", session))
}
