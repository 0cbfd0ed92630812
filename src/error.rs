use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DbError;

/// ApiResponse
///
/// The uniform envelope every endpoint answers with: `{success, data}` on success,
/// `{success: false, error}` on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Result type returned by every JSON handler.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// ApiError
///
/// Three tiers: client errors answer a short machine-readable code; dependency and
/// internal errors are logged with full detail here and answered with a generic 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid_credentials")]
    InvalidCredentials,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    ForbiddenBecause(&'static str),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("not_found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden | ApiError::ForbiddenBecause(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Database(DbError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The code sent to the caller. Server-side failures never expose their detail.
    pub fn code(&self) -> String {
        match self {
            ApiError::Database(DbError::Conflict(_)) => "already_exists".to_string(),
            ApiError::Database(_) | ApiError::Internal(_) => "internal_server_error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        ApiError::BadRequest("invalid_request_body")
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected query string");
        ApiError::BadRequest("invalid_query")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }
        (status, Json(ApiResponse::failure(self.code()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_code() {
        let err = ApiError::BadRequest("missing_required_fields");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "missing_required_fields");
        assert_eq!(ApiError::Forbidden.code(), "forbidden");
    }

    #[test]
    fn dependency_errors_hide_detail() {
        let err = ApiError::from(DbError::from(sqlx::Error::PoolTimedOut));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "internal_server_error");

        let err = ApiError::Internal("argon2 exploded".to_string());
        assert!(!err.code().contains("argon2"));
    }

    #[tokio::test]
    async fn error_body_uses_envelope() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "error": "unauthorized"}));
    }
}
