/// User endpoints
///
/// - `GET /api/v1/users` - Paginated user list (admin only)
/// - `PATCH /api/v1/users/:id/deactivate` - Deactivate an account (admin only)
/// - `GET /api/v1/users/me/progress` - Caller's completion figure

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{parse_id, ApiQuery},
    response::ApiResponse,
    routes::auth::UserData,
};
use taskdeck_shared::auth::principal::Principal;
use taskdeck_shared::models::user::UserProfile;
use taskdeck_shared::progress::UserProgress;
use taskdeck_shared::users::UserListQuery;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressData {
    pub progress: UserProgress,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<ApiResponse<Vec<UserProfile>>> {
    let page = state.users.list(&principal, query).await?;
    Ok(ApiResponse::paginated("Users fetched successfully", page))
}

/// Deactivate an account
///
/// The account keeps its tasks and its email stays reserved. Its refresh
/// token is revoked and its access tokens fail from the next request on.
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<UserData>> {
    let id = parse_id(&id, "Invalid user ID format")?;
    let user = state.users.deactivate(&principal, id).await?;
    Ok(ApiResponse::ok("User deactivated successfully", UserData { user }))
}

pub async fn my_progress(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ApiResponse<ProgressData>> {
    let progress = state.users.my_progress(&principal).await?;
    Ok(ApiResponse::ok(
        "Progress fetched successfully",
        ProgressData { progress },
    ))
}
