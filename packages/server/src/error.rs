use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::mail::MailError;
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `EMAIL_NOT_CONFIRMED`, `LOCKED_OUT`,
    /// `INVALID_TOKEN`, `UNAUTHORIZED`, `PERMISSION_DENIED`, `NOT_FOUND`, `CONFLICT`,
    /// `BAD_FILE_TYPE`, `EMAIL_DELIVERY_FAILED`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Title must be 1-256 characters")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// No bearer token on a request that requires one.
    TokenMissing,
    /// Bearer token failed signature, issuer, audience or expiry checks, or its
    /// subject no longer resolves to a user.
    TokenInvalid,
    InvalidCredentials,
    EmailNotConfirmed,
    LockedOut,
    /// A one-time email confirmation or password reset token was rejected.
    InvalidToken,
    /// Authenticated, but the resource belongs to someone else.
    Unauthorized(String),
    PermissionDenied,
    NotFound(String),
    /// A restrict rule blocked a delete.
    Conflict(String),
    BadFileType(String),
    /// The primary action succeeded but the follow-up email could not be sent.
    EmailDelivery(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: "Invalid login attempt".into(),
                },
            ),
            AppError::EmailNotConfirmed => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "EMAIL_NOT_CONFIRMED",
                    message: "Email not confirmed. Confirmation email has been sent".into(),
                },
            ),
            AppError::LockedOut => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "LOCKED_OUT",
                    message: "User account locked out".into(),
                },
            ),
            AppError::InvalidToken => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "INVALID_TOKEN",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "UNAUTHORIZED",
                    message: msg,
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::BadFileType(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "BAD_FILE_TYPE",
                    message: msg,
                },
            ),
            AppError::EmailDelivery(detail) => {
                tracing::warn!("Email delivery failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "EMAIL_DELIVERY_FAILED",
                        message: "Error sending email".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => AppError::NotFound(format!("Blob '{name}' not found")),
            StorageError::SizeLimitExceeded { limit, .. } => {
                AppError::Validation(format!("File exceeds maximum size of {limit} bytes"))
            }
            StorageError::InvalidName(name) => {
                AppError::Validation(format!("Invalid file name '{name}'"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::EmailDelivery(err.to_string())
    }
}
