use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use railparcel_auth::{NewUser, Permission, UserPatch};

use crate::app::dto::UserView;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{body, parse_id};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

/// GET /users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<UserView>>> {
    require(&principal, &Permission::USERS_MANAGE)?;
    Ok(Json(services.list_users().await?))
}

/// GET /users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    require(&principal, &Permission::USERS_MANAGE)?;
    Ok(Json(services.get_user(parse_id(&id)?).await?))
}

/// POST /users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let input = body(payload)?;
    let user = services.create_user(input, true).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /users/:id
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Json<UserView>> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    Ok(Json(services.update_user(id, patch, true).await?))
}

/// DELETE /users/:id
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require(&principal, &Permission::USERS_MANAGE)?;
    services.delete_user(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
