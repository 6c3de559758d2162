use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use railparcel_auth::Permission;
use railparcel_stations::{NewStation, Station, StationPatch};

use crate::app::dto::StationDetail;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{body, parse_id};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

/// The login page lists stations before anyone holds a token.
pub fn public_router() -> Router {
    Router::new().route("/", get(list_stations))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_station))
        .route("/:id", get(get_station).put(update_station).delete(delete_station))
}

/// GET /stations (public; the login page lists stations)
pub async fn list_stations(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Json<Vec<Station>>> {
    Ok(Json(services.list_stations().await?))
}

/// GET /stations/:id
pub async fn get_station(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<StationDetail>> {
    require(&principal, &Permission::STATIONS_READ)?;
    Ok(Json(services.station_detail(parse_id(&id)?).await?))
}

/// POST /stations
pub async fn create_station(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewStation>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Station>)> {
    require(&principal, &Permission::STATIONS_MANAGE)?;
    let input = body(payload)?;
    let station = services.create_station(input, true).await?;
    Ok((StatusCode::CREATED, Json(station)))
}

/// PUT /stations/:id
pub async fn update_station(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<StationPatch>, JsonRejection>,
) -> ApiResult<Json<Station>> {
    require(&principal, &Permission::STATIONS_MANAGE)?;
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    Ok(Json(services.update_station(id, patch, true).await?))
}

/// DELETE /stations/:id
pub async fn delete_station(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require(&principal, &Permission::STATIONS_MANAGE)?;
    services.delete_station(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "Station deleted successfully" })))
}
