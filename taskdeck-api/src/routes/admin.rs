/// Admin reporting
///
/// `GET /api/v1/admin/progress` (also served at `/api/v1/users/admin/progress`)
/// returns every active user's completion figure, highest first, ties by
/// name. `?includeInactive=true` adds deactivated accounts.

use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};

use crate::{app::AppState, error::ApiResult, extract::ApiQuery, response::ApiResponse};
use taskdeck_shared::auth::principal::Principal;
use taskdeck_shared::progress::UserProgress;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressReport {
    pub progress: Vec<UserProgress>,
    pub results: usize,
}

pub async fn all_progress(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<ProgressQuery>,
) -> ApiResult<ApiResponse<ProgressReport>> {
    let progress = state
        .users
        .all_progress(&principal, query.include_inactive)
        .await?;

    Ok(ApiResponse::ok(
        "All users progress fetched successfully",
        ProgressReport {
            results: progress.len(),
            progress,
        },
    ))
}
