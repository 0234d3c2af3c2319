//! Error taxonomy shared across the workspace.
//!
//! `ErrCode` is the *kind* of a failure; it decides the HTTP status and is what
//! travels on the wire. Crate-local error enums map into it rather than
//! leaking their own types across the authority boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds understood by every caller of the authority.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrCode {
    /// The request is structurally invalid (missing kid, unparseable body).
    InvalidArgument,
    /// The caller could not be authenticated or is not allowed to act.
    Unauthenticated,
    /// A requested entity does not exist. Remapped to `Unauthenticated`
    /// at the authorization boundary.
    NotFound,
    /// Key or policy infrastructure failed.
    Internal,
    /// The authority could not be reached.
    Unavailable,
}

impl ErrCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrCode::InvalidArgument => "invalid_argument",
            ErrCode::Unauthenticated => "unauthenticated",
            ErrCode::NotFound => "not_found",
            ErrCode::Internal => "internal",
            ErrCode::Unavailable => "unavailable",
        }
    }

    /// HTTP status code for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrCode::InvalidArgument => 400,
            ErrCode::Unauthenticated => 401,
            ErrCode::NotFound => 404,
            ErrCode::Internal => 500,
            ErrCode::Unavailable => 503,
        }
    }
}

impl core::fmt::Display for ErrCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// The error payload every endpoint returns and every client decodes:
/// `{"code": ..., "message": ..., "fields": [...]}`.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl AppError {
    pub fn new(code: ErrCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrCode::Unauthenticated, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrCode::Internal, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrCode::InvalidArgument, message)
    }

    /// Attach a field-level error.
    pub fn with_field(mut self, field: impl Into<String>, error: impl Into<String>) -> Self {
        self.fields.push(FieldError {
            field: field.into(),
            error: error.into(),
        });
        self
    }
}

/// Failure reported by a collaborator store (users, products, homes).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("authentication failed")]
    InvalidCredentials,

    #[error("store: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
