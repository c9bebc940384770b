/// API route handlers
///
/// Each module holds the handlers and request DTOs for one resource group.
/// Handlers return `ApiResult<ApiResponse<T>>` so every response, success or
/// failure, uses the same envelope.

pub mod admin;
pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

use std::borrow::Cow;

use axum::http::{Method, Uri};
use chrono::{DateTime, NaiveDate, Utc};
use validator::ValidationError;

use crate::error::ApiError;
use taskdeck_shared::auth::password::validate_password_strength;

/// Fallback for unmatched routes
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route not found: {} {}", method, uri.path()))
}

fn rule(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// 2-50 characters once surrounding whitespace is removed
pub(crate) fn validate_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if (2..=50).contains(&len) {
        Ok(())
    } else {
        Err(rule("name", "Name must be between 2 and 50 characters"))
    }
}

pub(crate) fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    validate_password_strength(password).map_err(|message| rule("password", message))
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
pub(crate) fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
