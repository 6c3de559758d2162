use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde_json::{json, Value};

use railparcel_auth::Permission;
use railparcel_messaging::NewMessage;

use crate::app::dto::MessageView;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{body, parse_id};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_messages).post(send_message))
        .route("/all", get(all_messages))
        .route("/station/:id", get(station_messages))
        .route("/unread/:id", get(unread_messages))
        .route("/:id", delete(delete_message))
        .route("/:id/read", put(mark_read))
}

/// GET /messages
pub async fn list_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<MessageView>>> {
    require(&principal, &Permission::MESSAGES_READ_ALL)?;
    Ok(Json(services.list_messages().await?))
}

/// GET /messages/all
///
/// Every station sees the whole feed, copies included.
pub async fn all_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<MessageView>>> {
    require(&principal, &Permission::MESSAGES_READ)?;
    Ok(Json(services.list_messages().await?))
}

/// GET /messages/station/:id
pub async fn station_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<MessageView>>> {
    require(&principal, &Permission::MESSAGES_READ)?;
    Ok(Json(services.station_messages(parse_id(&id)?).await?))
}

/// GET /messages/unread/:id
pub async fn unread_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<MessageView>>> {
    require(&principal, &Permission::MESSAGES_READ)?;
    Ok(Json(services.unread_messages(parse_id(&id)?).await?))
}

/// POST /messages
pub async fn send_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageView>)> {
    require(&principal, &Permission::MESSAGES_SEND)?;
    let from = principal.station()?;
    let input = body(payload)?;
    let message = services.send_message(from, input).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// PUT /messages/:id/read
pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require(&principal, &Permission::MESSAGES_READ)?;
    let reader = principal.station()?;
    let message = services.mark_read(parse_id(&id)?, reader).await?;
    Ok(Json(json!({
        "message": "Message marked as read",
        "id": message.id,
        "read": message.read,
    })))
}

/// DELETE /messages/:id
pub async fn delete_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    services.delete_message(parse_id(&id)?, &principal).await?;
    Ok(Json(json!({ "message": "Message deleted successfully" })))
}
