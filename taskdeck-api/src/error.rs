/// HTTP error mapping
///
/// Handlers return [`ApiResult`]; errors from the shared crate convert with
/// `?` and pick their status here. Bodies always use the envelope:
///
/// ```json
/// { "success": false, "message": "Task not found" }
/// ```
///
/// A 422 also carries `errors: [{ "field": .., "message": .. }]`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use taskdeck_shared::auth::authorization::AuthzError;
use taskdeck_shared::auth::password::PasswordError;
use taskdeck_shared::auth::session::AuthError;
use taskdeck_shared::store::StoreError;
use taskdeck_shared::tasks::TaskError;
use taskdeck_shared::users::UserError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Top-level message of every 422
pub const VALIDATION_FAILED: &str = "Validation failed. Please check your input.";

/// Single 401 message for every rejected access token
///
/// Expired, forged and revoked tokens are told apart only in the guard's
/// `reason` log field.
pub const SESSION_REJECTED: &str = "Invalid or expired token. Please log in again.";

/// Client-visible text for 500s; the detail only goes to the log
const INTERNAL_MESSAGE: &str = "Internal server error";
const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400: unreadable body or query
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 409: unique key taken (email)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// 422 with per-field detail
    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<ValidationErrorDetail>),

    /// 429 for a fronting limiter; sets `Retry-After`
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { retry_after: u64, message: String },

    #[error("Internal error: {0}")]
    InternalError(String),

    /// 503: store timed out or is unreachable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Splits into the client-facing message and field list
    fn into_parts(self) -> (String, Option<Vec<ValidationErrorDetail>>) {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::RateLimitExceeded { message: msg, .. } => (msg, None),
            ApiError::ValidationError(details) => (VALIDATION_FAILED.to_string(), Some(details)),
            ApiError::InternalError(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (INTERNAL_MESSAGE.to_string(), None)
            }
            ApiError::ServiceUnavailable(detail) => {
                tracing::warn!(error = %detail, "Store unavailable");
                (UNAVAILABLE_MESSAGE.to_string(), None)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Failure envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationErrorDetail>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            ApiError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        };
        let (message, errors) = self.into_parts();

        let mut response = (
            status,
            Json(ErrorResponse {
                success: false,
                message,
                errors,
            }),
        )
            .into_response();

        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field, value } => {
                ApiError::Conflict(format!("Duplicate value: {} '{}' already exists.", field, value))
            }
            StoreError::Unavailable(msg) => ApiError::ServiceUnavailable(msg),
            StoreError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AccountDeactivated => ApiError::Forbidden(err.to_string()),
            AuthError::EmailTaken => ApiError::Conflict(err.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(err.to_string()),
            AuthError::TokenExpired | AuthError::InvalidToken | AuthError::SessionInvalid => {
                ApiError::Unauthorized(SESSION_REJECTED.to_string())
            }
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::RefreshRejected
            | AuthError::WrongPassword => ApiError::Unauthorized(err.to_string()),
            AuthError::Password(e) => e.into(),
            AuthError::TokenIssue(msg) => ApiError::InternalError(format!("signing tokens: {msg}")),
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("password hashing: {err}"))
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound => ApiError::NotFound(err.to_string()),
            TaskError::Forbidden(e) => e.into(),
            TaskError::Invalid { field, message } => ApiError::invalid(field, message),
            TaskError::Store(e) => e.into(),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => ApiError::NotFound(err.to_string()),
            UserError::Forbidden(e) => e.into(),
            UserError::Store(e) => e.into(),
        }
    }
}

/// `#[derive(Validate)]` failures become one detail per message, by field
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value for {field}"),
                };
                details.push(ValidationErrorDetail {
                    field: field.to_string(),
                    message,
                });
            }
        }

        // field_errors() is a HashMap
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_shared::models::user::Role;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_names_the_kind() {
        assert_eq!(
            ApiError::NotFound("Task not found".to_string()).to_string(),
            "Not found: Task not found"
        );
        assert_eq!(
            ApiError::invalid("title", "Title is required").to_string(),
            "Validation failed: 1 errors"
        );
    }

    #[tokio::test]
    async fn test_422_lists_fields() {
        let err = ApiError::ValidationError(vec![
            ValidationErrorDetail {
                field: "email".to_string(),
                message: "Please provide a valid email address".to_string(),
            },
            ValidationErrorDetail {
                field: "password".to_string(),
                message: "Password must be at least 6 characters".to_string(),
            },
        ]);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], VALIDATION_FAILED);
        assert_eq!(json["errors"][1]["field"], "password");
    }

    #[tokio::test]
    async fn test_500_keeps_detail_out_of_body() {
        let response = ApiError::InternalError("connection reset by peer".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["message"], INTERNAL_MESSAGE);
        assert!(json.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_store_timeout_is_503() {
        let response = ApiError::from(StoreError::Unavailable("statement timeout".to_string()))
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["message"], UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn test_429_carries_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 30,
            message: "Too many requests".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
    }

    #[test]
    fn test_domain_error_mapping() {
        assert_eq!(
            ApiError::from(AuthError::AccountDeactivated).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::from(AuthError::EmailTaken).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(AuthError::RefreshRejected).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::from(TaskError::NotFound).status(), StatusCode::NOT_FOUND);
        for rejected in [
            AuthError::TokenExpired,
            AuthError::InvalidToken,
            AuthError::SessionInvalid,
        ] {
            assert_eq!(
                ApiError::from(rejected).to_string(),
                format!("Unauthorized: {SESSION_REJECTED}")
            );
        }
        assert_eq!(
            ApiError::from(TaskError::Forbidden(AuthzError::NotOwner)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(UserError::Forbidden(AuthzError::InsufficientRole {
                required: vec![Role::Admin],
                actual: Role::User,
            }))
            .status(),
            StatusCode::FORBIDDEN
        );

        match ApiError::from(TaskError::Invalid {
            field: "dueDate".to_string(),
            message: "Due date cannot be in the past".to_string(),
        }) {
            ApiError::ValidationError(details) => assert_eq!(details[0].field, "dueDate"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_email_message() {
        let err = ApiError::from(StoreError::Conflict {
            field: "email".to_string(),
            value: "ada@example.com".to_string(),
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(
            err.to_string(),
            "Conflict: Duplicate value: email 'ada@example.com' already exists."
        );
    }
}
