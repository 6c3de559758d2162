//! Administrator surface.
//!
//! Administrators manage accounts and stations across the network. Users
//! created here are always plain `user`s, and the master flag on stations is
//! never set or changed from these routes.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use railparcel_auth::{Admin, NewUser, UserPatch};
use railparcel_stations::{NewStation, Station, StationPatch};

use crate::app::dto::{AdminSendOtpRequest, AdminVerifyOtpRequest, AssignUserRequest, StationDetail, UserView};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{body, parse_id};
use crate::app::services::{AdminLogin, AppServices, OtpSent};
use crate::authz::require_admin;
use crate::context::PrincipalContext;

/// Login endpoints, reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
}

/// Protected admin routes, nested under `/admin`.
pub fn router() -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/stations", get(list_stations).post(create_station))
        .route(
            "/stations/:id",
            get(get_station).put(update_station).delete(delete_station),
        )
        .route("/assign-user", post(assign_user))
}

/// POST /admin/send-otp
pub async fn send_otp(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<AdminSendOtpRequest>, JsonRejection>,
) -> ApiResult<Json<OtpSent>> {
    let req = body(payload)?;
    Ok(Json(services.send_admin_otp(req).await?))
}

/// POST /admin/verify-otp
pub async fn verify_otp(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<AdminVerifyOtpRequest>, JsonRejection>,
) -> ApiResult<Json<AdminLogin>> {
    let req = body(payload)?;
    Ok(Json(services.verify_admin_otp(req).await?))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Admin>> {
    require_admin(&principal)?;
    Ok(Json(services.current_admin(&principal).await?))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<UserView>>> {
    require_admin(&principal)?;
    Ok(Json(services.list_users().await?))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    require_admin(&principal)?;
    Ok(Json(services.get_user(parse_id(&id)?).await?))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    require_admin(&principal)?;
    let input = body(payload)?;
    let user = services.create_user(input, false).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Json<UserView>> {
    require_admin(&principal)?;
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    Ok(Json(services.update_user(id, patch, false).await?))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_admin(&principal)?;
    services.delete_user(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

pub async fn list_stations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<Station>>> {
    require_admin(&principal)?;
    Ok(Json(services.list_stations().await?))
}

pub async fn get_station(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<StationDetail>> {
    require_admin(&principal)?;
    Ok(Json(services.station_detail(parse_id(&id)?).await?))
}

pub async fn create_station(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewStation>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Station>)> {
    require_admin(&principal)?;
    let input = body(payload)?;
    let station = services.create_station(input, false).await?;
    Ok((StatusCode::CREATED, Json(station)))
}

pub async fn update_station(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<StationPatch>, JsonRejection>,
) -> ApiResult<Json<Station>> {
    require_admin(&principal)?;
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    Ok(Json(services.update_station(id, patch, false).await?))
}

pub async fn delete_station(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_admin(&principal)?;
    services.delete_station(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "Station deleted successfully" })))
}

/// POST /admin/assign-user
pub async fn assign_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<AssignUserRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    require_admin(&principal)?;
    let req = body(payload)?;
    let (Some(user_id), Some(station_id)) = (req.user_id.as_deref(), req.station_id.as_deref()) else {
        return Err(ApiError::bad_request("user_id and station_id are required"));
    };
    let user = services.assign_user(parse_id(user_id)?, parse_id(station_id)?).await?;
    Ok(Json(json!({
        "message": "User assigned to station successfully",
        "user": user,
    })))
}
