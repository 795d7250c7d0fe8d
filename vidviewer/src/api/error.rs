//! API error handling.
//!
//! Provides consistent error responses for the API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{Error, ExternalTool};

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Create a 409 Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// Create a 422 Unprocessable Entity error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// A 422 carrying every failed form check in `details.errors`.
    pub fn validation_errors(errors: Vec<String>) -> Self {
        let message = errors.join("; ");
        Self::validation(message).with_details(serde_json::json!({ "errors": errors }))
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Create a 503 Service Unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { entity_type, id } => {
                ApiError::not_found(format!("{} with id '{}' not found", entity_type, id))
            }
            Error::AlreadyExists { entity_type, id } => {
                ApiError::conflict(format!("{} exists", entity_type))
                    .with_details(serde_json::json!({ "id": id }))
            }
            Error::InvalidStateTransition { from, to } => {
                ApiError::conflict(format!("Cannot transition from {} to {}", from, to))
            }
            Error::Validation(msg) => ApiError::validation(msg),
            Error::ExternalToolNotFound(tool) => {
                let code = match tool {
                    ExternalTool::Ffmpeg => "FFMPEG_NOT_FOUND",
                    ExternalTool::YtDlp => "YTDLP_NOT_FOUND",
                };
                ApiError::new(StatusCode::BAD_REQUEST, code, format!("{} not found", tool))
            }
            Error::RootFolderMissing(path) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "ROOT_FOLDER_NOT_FOUND",
                if path.is_empty() {
                    "Root folder is not configured".to_string()
                } else {
                    format!("Root folder not found: {}", path)
                },
            ),
            Error::Configuration(msg) => ApiError::bad_request(msg),
            Error::DatabaseSqlx(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::internal("Database error occurred")
            }
            Error::Io(e) => {
                tracing::error!("IO error: {}", e);
                ApiError::internal("IO error occurred")
            }
            Error::IoPath { .. } => {
                tracing::error!("IO error: {}", err);
                ApiError::internal("IO error occurred")
            }
            _ => {
                tracing::error!("Unexpected error: {}", err);
                ApiError::internal(err.to_string())
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_creation() {
        let err = ApiError::not_found("Video not found");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "Video not found");
    }

    #[test]
    fn test_validation_errors_details() {
        let err = ApiError::validation_errors(vec![
            "Invalid playlist".to_string(),
            "URL cannot be blank".to_string(),
        ]);
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        let details = err.details.unwrap();
        assert_eq!(details["errors"].as_array().unwrap().len(), 2);
        assert_eq!(details["errors"][0], "Invalid playlist");
    }

    #[test]
    fn test_from_domain_error() {
        let api_err: ApiError = Error::not_found("Video", "123").into();
        assert_eq!(api_err.status, StatusCode::NOT_FOUND);
        assert!(api_err.message.contains("123"));

        let api_err: ApiError = Error::already_exists("Video", "42").into();
        assert_eq!(api_err.status, StatusCode::CONFLICT);
        assert_eq!(api_err.message, "Video exists");
        assert_eq!(api_err.details.unwrap()["id"], "42");
    }

    #[test]
    fn test_tool_errors_carry_codes() {
        let api_err: ApiError = Error::ExternalToolNotFound(ExternalTool::Ffmpeg).into();
        assert_eq!(api_err.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_err.code, "FFMPEG_NOT_FOUND");

        let api_err: ApiError = Error::ExternalToolNotFound(ExternalTool::YtDlp).into();
        assert_eq!(api_err.code, "YTDLP_NOT_FOUND");

        let api_err: ApiError = Error::RootFolderMissing("/nope".to_string()).into();
        assert_eq!(api_err.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_err.code, "ROOT_FOLDER_NOT_FOUND");
    }

    #[test]
    fn test_state_transition_is_conflict() {
        let api_err: ApiError = Error::InvalidStateTransition {
            from: "Running".to_string(),
            to: "Pending".to_string(),
        }
        .into();
        assert_eq!(api_err.status, StatusCode::CONFLICT);
    }
}
