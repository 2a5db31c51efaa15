//! API error types
//!
//! Every handler failure becomes a JSON body `{"error": "..."}` with the
//! matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

pub const MSG_INCOMPLETE: &str = "please provide complete data";
pub const MSG_NO_DATA: &str = "no new data";
pub const MSG_BAD_AGE: &str = "age must be an integer";
pub const MSG_BAD_FORM: &str = "invalid form data";
pub const MSG_STUDENT_NOT_FOUND: &str = "student not found";
pub const MSG_FILE_NOT_FOUND: &str = "file not found";

/// Errors returned by API handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed request fields
    #[error("{0}")]
    Validation(&'static str),

    /// Unknown record id or cache file
    #[error("{0}")]
    NotFound(&'static str),

    /// Store or filesystem failure
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = ?e, "Request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Validation(MSG_NO_DATA).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::NotFound(MSG_STUDENT_NOT_FOUND).status(),
            StatusCode::NOT_FOUND
        );
        let internal: ApiError = anyhow::anyhow!("disk full").into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_error_response_status() {
        let response = ApiError::Internal(anyhow::anyhow!("secret path /var/db")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
