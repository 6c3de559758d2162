use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use railparcel_auth::{AuthzError, JwtError, OtpError};
use railparcel_core::DomainError;
use railparcel_infra::{StoreError, UploadError};

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error("{0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Store(e) => store_error_to_response(e),
            ApiError::Authz(e) => match e {
                AuthzError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
                AuthzError::NoStation => json_error(StatusCode::FORBIDDEN, "no_station", e.to_string()),
            },
            ApiError::Otp(e) => {
                let code = match e {
                    OtpError::NotRequested => "otp_not_requested",
                    OtpError::Expired => "otp_expired",
                    OtpError::Mismatch => "otp_invalid",
                };
                json_error(StatusCode::BAD_REQUEST, code, e.to_string())
            }
            ApiError::Upload(e) => match e {
                UploadError::Io(ref io) => {
                    tracing::error!(error = %io, "image write failed");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "upload_error", "server error")
                }
                other => json_error(StatusCode::BAD_REQUEST, "invalid_upload", other.to_string()),
            },
            ApiError::Token(e) => {
                tracing::error!(error = %e, "token encoding failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", "server error")
            }
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invariant_violation", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized"),
        DomainError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "server error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
