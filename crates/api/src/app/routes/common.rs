use core::str::FromStr;

use axum::{extract::rejection::JsonRejection, Json};

use railparcel_core::DomainError;

use crate::app::errors::{ApiError, ApiResult};

/// Parse a path segment into a typed id; malformed ids are a 400.
pub fn parse_id<T>(raw: &str) -> ApiResult<T>
where
    T: FromStr<Err = DomainError>,
{
    Ok(raw.parse::<T>()?)
}

/// Unwrap a JSON body, turning axum's rejection into the JSON error shape.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}
