/// Bearer token guard
///
/// Resolves the `Authorization` header to a [`Principal`] and stores it in
/// the request extensions, where handlers pick it up with
/// `Extension<Principal>`. Missing, expired or invalid tokens and stale
/// sessions are rejected with a 401 before the handler runs.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;
use taskdeck_shared::auth::principal::Principal;

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let principal: Principal = state
        .sessions
        .authenticate_request(header_value)
        .await
        .map_err(|err| {
            debug!(error = %err, path = %req.uri().path(), "Request rejected by auth guard");
            ApiError::from(err)
        })?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
