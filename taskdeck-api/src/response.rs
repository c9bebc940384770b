/// Success response envelope
///
/// ```json
/// { "success": true, "message": "Task created successfully", "data": { ... } }
/// ```
///
/// List endpoints add a `pagination` block next to `data`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use taskdeck_shared::models::page::{Page, PageMeta};

/// Success response body
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,
}

/// A success envelope together with its status code
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    body: Envelope<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with data
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, Some(data))
    }

    /// 201 with data
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, Some(data))
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status,
            body: Envelope {
                success: true,
                message: message.into(),
                data,
                pagination: None,
            },
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// 200 with one page of items and its pagination block
    pub fn paginated(message: impl Into<String>, page: Page<T>) -> Self {
        let meta = page.meta();
        let mut response = Self::ok(message, page.items);
        response.body.pagination = Some(meta);
        response
    }
}

impl ApiResponse<()> {
    /// 200 without data
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, message, None)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
