use axum::http::StatusCode;
use axum::response::IntoResponse;

use tollgate_auth::AuthError;
use tollgate_core::{AppError, ErrCode};

use crate::authclient::ClientError;

/// HTTP rendering of an [`AppError`]: the payload is the error itself, the
/// status follows its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn new(code: ErrCode, message: impl Into<String>) -> Self {
        Self(AppError::new(code, message))
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self(AppError::unauthenticated(message))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        json_error(self.0)
    }
}

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        Self(value.into())
    }
}

impl From<ClientError> for ApiError {
    fn from(value: ClientError) -> Self {
        Self(value.into())
    }
}

pub fn json_error(err: AppError) -> axum::response::Response {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(err)).into_response()
}
