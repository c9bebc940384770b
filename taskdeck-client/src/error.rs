/// Client error type

use serde::Deserialize;

/// Per-field validation failure reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Errors returned by [`crate::ApiClient`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (connect, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The session is gone and could not be renewed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No token pair is held; log in or register first
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The API answered with a non-2xx status
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        errors: Vec<FieldError>,
    },

    /// A success response did not have the expected shape
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A success response carried no `data` block
    #[error("Response is missing its data payload")]
    MissingData,
}

impl ClientError {
    /// HTTP status of an API error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(_) => Some(401),
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Request(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
