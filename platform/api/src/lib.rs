//! Boundary error type shared by HTTP surfaces.
//!
//! Every failure leaves the process as `{ success: false, code, message,
//! ...context }` with a status derived from the error kind.

use std::sync::Arc;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use platform_authn::{AccountError, ResolveError, StoreError};
use platform_authz::DenyReason;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{error, warn};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error(transparent)]
    Unauthenticated(Arc<ResolveError>),
    #[error(transparent)]
    Forbidden(#[from] DenyReason),
    #[error(transparent)]
    Validation(#[from] AccountError),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("resource not found")]
    NotFound,
    #[error("email {0} already registered")]
    EmailTaken(String),
    #[error("service temporarily unavailable")]
    Unavailable(Arc<anyhow::Error>),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(Arc::new(err.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(err) => match err.as_ref() {
                ResolveError::ResolutionUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::UNAUTHORIZED,
            },
            ApiError::Forbidden(DenyReason::TargetRoleUnspecified) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::EmailTaken(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(err) => err.code(),
            ApiError::Forbidden(reason) => reason.code(),
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::EmailTaken(_) => "EMAIL_TAKEN",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    /// Structured detail merged into the body next to `code` and `message`.
    fn context(&self) -> Map<String, Value> {
        let context = match self {
            ApiError::Forbidden(DenyReason::RoleNotAllowed { allowed, actual }) => json!({
                "allowedRoles": allowed,
                "userRole": actual,
            }),
            ApiError::Forbidden(DenyReason::InsufficientGeoScope { required, actual }) => json!({
                "requiredGeoScope": required,
                "userGeoScope": actual,
            }),
            ApiError::Forbidden(DenyReason::PermissionDenied { required }) => json!({
                "requiredPermission": required,
            }),
            ApiError::Forbidden(DenyReason::CannotModifyEqualOrHigherRole { actual, target }) => {
                json!({
                    "userRole": actual,
                    "targetRole": target,
                })
            }
            ApiError::Forbidden(DenyReason::AdminCreationRestricted { requested }) => json!({
                "requestedRole": requested,
            }),
            _ => return Map::new(),
        };
        match context {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(value: ResolveError) -> Self {
        Self::Unauthenticated(Arc::new(value))
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::EmailTaken(email) => Self::EmailTaken(email),
            StoreError::Backend(_) => Self::Unavailable(Arc::new(value.into())),
            StoreError::Corrupt { .. } => Self::internal(value),
        }
    }
}

/// Malformed bodies, including out-of-range levels and unknown role or
/// designation tags, surface as `INVALID_INPUT` rather than axum's plain text.
impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::InvalidInput(value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        Self::InvalidInput(value.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(err) => error!(error = ?err, "request failed"),
            ApiError::Unavailable(err) => warn!(error = ?err, "dependency unavailable"),
            ApiError::Unauthenticated(err) => {
                if let ResolveError::ResolutionUnavailable(source) = err.as_ref() {
                    warn!(error = %source, "identity resolution unavailable");
                }
            }
            _ => {}
        }

        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));
        body.insert("code".into(), Value::from(self.code()));
        body.insert("message".into(), Value::from(self.to_string()));
        body.extend(self.context());
        (status, Json(Value::Object(body))).into_response()
    }
}
