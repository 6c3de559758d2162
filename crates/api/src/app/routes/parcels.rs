use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, FromRequest, Multipart, Path, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Map, Number, Value};

use railparcel_auth::Permission;
use railparcel_parcels::{NewParcel, ParcelTracking};

use crate::app::dto::{ParcelView, UpdateStatusRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{body, parse_id};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

/// Multipart field carrying the parcel photo.
const IMAGE_FIELD: &str = "image";

pub fn public_router() -> Router {
    Router::new().route("/track/:tracking_number", get(track_parcel))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_parcels).post(create_parcel))
        .route("/station/:id", get(station_parcels))
        .route("/:id", get(get_parcel).delete(delete_parcel))
        .route("/:id/image", post(upload_image))
        .route("/:id/status", put(update_status))
}

/// GET /parcels
pub async fn list_parcels(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<ParcelView>>> {
    require(&principal, &Permission::PARCELS_READ_ALL)?;
    Ok(Json(services.list_parcels().await?))
}

/// GET /parcels/station/:id
pub async fn station_parcels(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ParcelView>>> {
    require(&principal, &Permission::PARCELS_READ)?;
    Ok(Json(services.list_station_parcels(parse_id(&id)?).await?))
}

/// GET /parcels/:id
pub async fn get_parcel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<ParcelView>> {
    require(&principal, &Permission::PARCELS_READ)?;
    Ok(Json(services.parcel_detail(parse_id(&id)?).await?))
}

/// POST /parcels
///
/// Takes a JSON body, or a multipart form whose optional `image` part is the
/// parcel photo. The sender station is the caller's own; the body cannot
/// override it.
pub async fn create_parcel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    request: Request,
) -> ApiResult<(StatusCode, Json<ParcelView>)> {
    require(&principal, &Permission::PARCELS_CREATE)?;
    let station = principal.station()?;

    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    let (input, image) = if is_form {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        booking_form(multipart).await?
    } else {
        let payload: Result<Json<NewParcel>, JsonRejection> = Json::from_request(request, &()).await;
        (body(payload)?, None)
    };

    let parcel = services.create_parcel_with_image(station, input, image).await?;
    Ok((StatusCode::CREATED, Json(parcel)))
}

/// Collect booking fields from a form. Text parts become JSON fields; blank
/// parts are treated as absent.
async fn booking_form(mut multipart: Multipart) -> ApiResult<(NewParcel, Option<(String, Vec<u8>)>)> {
    let mut fields = Map::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
            if !bytes.is_empty() {
                image = Some((file_name, bytes.to_vec()));
            }
            continue;
        }

        let text = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let value = if name == "weight" {
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| ApiError::bad_request("weight must be a number"))?
        } else {
            Value::String(text.to_string())
        };
        fields.insert(name, value);
    }

    let input = serde_json::from_value(Value::Object(fields)).map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok((input, image))
}

/// POST /parcels/:id/image
pub async fn upload_image(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    require(&principal, &Permission::PARCELS_UPLOAD_IMAGE)?;
    let id = parse_id(&id)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
        let image_url = services.attach_image(id, &file_name, &bytes).await?;
        return Ok(Json(json!({
            "message": "Image uploaded successfully",
            "image_url": image_url,
        })));
    }

    Err(ApiError::bad_request("no image uploaded"))
}

/// PUT /parcels/:id/status
pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Json<ParcelView>> {
    require(&principal, &Permission::PARCELS_UPDATE_STATUS)?;
    let station = principal.station()?;
    let id = parse_id(&id)?;
    let req = body(payload)?;
    Ok(Json(services.update_status(id, &req.status, station).await?))
}

/// DELETE /parcels/:id
pub async fn delete_parcel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require(&principal, &Permission::PARCELS_DELETE)?;
    services.delete_parcel(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "Parcel deleted successfully" })))
}

/// GET /parcels/track/:tracking_number (public)
pub async fn track_parcel(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tracking_number): Path<String>,
) -> ApiResult<Json<ParcelTracking>> {
    Ok(Json(services.track(&tracking_number).await?))
}
