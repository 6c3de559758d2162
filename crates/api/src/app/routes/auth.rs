//! Station user login by one-time code.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    routing::{get, post},
    Json, Router,
};

use railparcel_core::DomainError;

use crate::app::dto::{SendOtpRequest, UserView, VerifyOtpRequest};
use crate::app::errors::ApiResult;
use crate::app::routes::common::body;
use crate::app::services::{AppServices, OtpSent, UserLogin};
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
}

pub fn router() -> Router {
    Router::new().route("/me", get(me))
}

/// POST /auth/send-otp
pub async fn send_otp(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> ApiResult<Json<OtpSent>> {
    let req = body(payload)?;
    Ok(Json(services.send_user_otp(req).await?))
}

/// POST /auth/verify-otp
pub async fn verify_otp(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> ApiResult<Json<UserLogin>> {
    let req = body(payload)?;
    Ok(Json(services.verify_user_otp(req).await?))
}

/// GET /auth/me
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<UserView>> {
    let user_id = principal
        .user_id()
        .ok_or_else(|| DomainError::forbidden("station user token required"))?;
    Ok(Json(services.current_user(user_id).await?))
}
