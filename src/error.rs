use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    auth::TokenError, duplication::DuplicationError, models::ErrorBody, policy::DenyReason,
    reporting::ReportError, repository::RepoError, storage::StorageError,
};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// ApiError
///
/// Unified error type of the HTTP layer. Every handler returns `ApiResult<T>`; the
/// `IntoResponse` impl turns each variant into its status code and a `{ "error": ... }`
/// JSON body. Lower layers keep their own error enums and convert through `From`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad input (400).
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid, expired or revoked credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403).
    #[error("{0}")]
    Forbidden(String),

    /// Unknown entity (404).
    #[error("{0}")]
    NotFound(String),

    /// State conflict such as a duplicate email or a repeated duplication (400).
    #[error("{0}")]
    Conflict(String),

    /// Anything the client cannot fix (500). The detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{entity} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed with an internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

// --- Lower-layer conversions ---

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict(message) => ApiError::Conflict(message),
            RepoError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound("File not found".to_string()),
            StorageError::Backend(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => ApiError::Unauthorized(err.to_string()),
            TokenError::Signing(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        ApiError::Forbidden(reason.to_string())
    }
}

impl From<DuplicationError> for ApiError {
    fn from(err: DuplicationError) -> Self {
        match err {
            DuplicationError::NotFound => ApiError::not_found("Course"),
            DuplicationError::AlreadyOwner | DuplicationError::AlreadyDuplicated => {
                ApiError::Conflict(err.to_string())
            }
            DuplicationError::Forbidden(reason) => reason.into(),
            DuplicationError::Repo(e) => e.into(),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

// --- Extractor rejections ---
// Malformed bodies, path segments and query strings answer with the same JSON shape.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Validation(err.body_text())
    }
}
