//! Error types for quill.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Field name to list of messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Comment not found: {0}")]
    CommentNotFound(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: FieldErrors,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Email service error: {0}")]
    EmailService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation error without per-field details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_)
            | Self::UserNotFound(_)
            | Self::PostNotFound(_)
            | Self::CommentNotFound(_)
            | Self::ImageNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,

            // 5xx Server Errors
            Self::EmailService(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_)
            | Self::Config(_)
            | Self::Mail(_)
            | Self::Storage(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::PostNotFound(_) => "POST_NOT_FOUND",
            Self::CommentNotFound(_) => "COMMENT_NOT_FOUND",
            Self::ImageNotFound(_) => "IMAGE_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Mail(_) => "MAIL_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::EmailService(_) => "EMAIL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        // Internal details stay in the logs.
        let message = match &self {
            Self::Database(_) | Self::Internal(_) | Self::Config(_) | Self::Storage(_) => {
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = match self {
            Self::Validation { fields, .. } if !fields.is_empty() => json!({
                "error": {
                    "code": code,
                    "message": message,
                    "details": fields,
                }
            }),
            _ => json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errors) in err.field_errors() {
            let messages = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| e.code.to_string(), ToString::to_string)
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        Self::Validation {
            message: "Invalid input".to_string(),
            fields,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Form {
        #[validate(length(min = 1, message = "Title is required"))]
        title: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::PostNotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::validation("bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::EmailService("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert!(AppError::Database("x".into()).is_server_error());
        assert!(!AppError::Forbidden("x".into()).is_server_error());
    }

    #[test]
    fn test_validation_errors_are_collected_per_field() {
        let form = Form {
            title: String::new(),
            email: "not-an-email".to_string(),
        };
        let err: AppError = form.validate().unwrap_err().into();

        match err {
            AppError::Validation { fields, .. } => {
                assert_eq!(fields["title"], vec!["Title is required".to_string()]);
                assert_eq!(fields["email"], vec!["email".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_into_response_status() {
        let response = AppError::Forbidden("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
