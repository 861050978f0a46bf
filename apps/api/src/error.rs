//! API error handling.
//!
//! Every failure leaves the server as the same JSON envelope:
//!
//! ```json
//! { "statusCode": 401, "message": "Invalid refresh token", "success": false, "errors": [] }
//! ```
//!
//! Lower layers return their own `thiserror` enums; the `From` impls below
//! decide the status code and which details a client may see.

use axum::{
    extract::{
        multipart::MultipartError,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::{JwtError, PasswordError};
use crate::media::MediaError;
use crate::session::SessionError;
use vidtube_core::{CoreError, ValidationError};
use vidtube_db::DbError;

/// API error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<String>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Attach per-field details.
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Create a 401 Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Create a 403 Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Create a 409 Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Create a 503 Service Unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            status_code: self.status.as_u16(),
            message: self.message,
            success: false,
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingCredential => ApiError::unauthorized("Unauthorized request"),
            SessionError::InvalidCredential | SessionError::UnknownIdentity => {
                ApiError::unauthorized("Invalid refresh token")
            }
            SessionError::StaleCredential => {
                ApiError::unauthorized("Refresh token is expired or used")
            }
            SessionError::CredentialIssuance(_) => ApiError::internal(
                "Something went wrong while generating access and refresh token",
            ),
            SessionError::Revocation(_) => ApiError::internal("Something went wrong while logging out"),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        ApiError::bad_request(message.clone()).with_errors(vec![message])
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UserNotFound(_) => ApiError::not_found("User does not exist"),
            CoreError::VideoNotFound(_) => ApiError::not_found("Video not found"),
            CoreError::NotOwner { .. } => ApiError::forbidden(err.to_string()),
            CoreError::DuplicateUser => ApiError::conflict(err.to_string()),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => ApiError::not_found(format!("{entity} not found")),
            DbError::UniqueViolation { field, .. } => {
                // "users.email" -> "email"
                let column = field.rsplit('.').next().unwrap_or(&field).to_string();
                ApiError::conflict(format!("{column} is already in use"))
            }
            DbError::PoolExhausted | DbError::ConnectionFailed(_) => {
                error!("Database unavailable: {}", err);
                ApiError::service_unavailable("Database unavailable")
            }
            _ => {
                error!("Database error: {}", err);
                ApiError::internal("Database error occurred")
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::NotConfigured => ApiError::bad_request("Media storage is not configured"),
            _ => {
                error!("Upload failed: {}", err);
                ApiError::bad_request("Error while uploading file")
            }
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Signing(_) => {
                error!("Token signing failed: {}", err);
                ApiError::internal("Something went wrong while generating access and refresh token")
            }
            _ => ApiError::unauthorized("Invalid access token"),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        error!("{}", err);
        ApiError::internal("Failed to process password")
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::bad_request(format!("Invalid form data: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        ApiError::bad_request(err.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::bad_request(err.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        ApiError::bad_request(err.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        ApiError::bad_request(err.body_text())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        error!("IO error: {}", err);
        ApiError::internal("IO error occurred")
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
