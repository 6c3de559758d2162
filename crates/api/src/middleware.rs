use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use railparcel_auth::{JwtClaims, JwtValidator, PrincipalKind, Role};
use railparcel_infra::SharedStore;

use crate::app::errors::json_error;
use crate::authz::principal_for;
use crate::context::PrincipalContext;

/// Header accepted alongside `Authorization: Bearer`.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub store: SharedStore,
}

/// Verify the token, then re-check the account behind it.
///
/// A user whose account was deleted gets 401; a user whose station was
/// deleted gets 403. Roles and station come from the current record, not
/// the token, so reassignments apply immediately.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token(req.headers())
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "unauthorized", "no token, authorization denied"))?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        json_error(StatusCode::UNAUTHORIZED, "unauthorized", "token is not valid")
    })?;

    let principal = resolve(&state, &claims).await?;
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

async fn resolve(state: &AuthState, claims: &JwtClaims) -> Result<PrincipalContext, Response> {
    let lookup_failed = |e: railparcel_infra::StoreError| {
        tracing::error!(error = %e, "account lookup failed");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "server error")
    };

    match claims.kind {
        PrincipalKind::User => {
            let user = state
                .store
                .get_user(claims.sub.as_user_id())
                .await
                .map_err(lookup_failed)?
                .ok_or_else(|| {
                    json_error(
                        StatusCode::UNAUTHORIZED,
                        "unauthorized",
                        "user not found; the account may have been deleted",
                    )
                })?;

            let station = state.store.get_station(user.station_id).await.map_err(lookup_failed)?;
            if station.is_none() {
                return Err(json_error(
                    StatusCode::FORBIDDEN,
                    "no_station",
                    "your account is not associated with any station; contact an administrator",
                ));
            }

            Ok(PrincipalContext::new(principal_for(
                claims.sub,
                PrincipalKind::User,
                Some(user.station_id),
                vec![user.role],
            )))
        }
        PrincipalKind::Admin => {
            let admin = state
                .store
                .get_admin(claims.sub.as_admin_id())
                .await
                .map_err(lookup_failed)?;
            if admin.is_none() {
                return Err(json_error(StatusCode::UNAUTHORIZED, "unauthorized", "token is not valid"));
            }
            Ok(PrincipalContext::new(principal_for(
                claims.sub,
                PrincipalKind::Admin,
                None,
                vec![Role::ADMIN],
            )))
        }
    }
}

/// `Authorization: Bearer <token>` first, then `x-auth-token`.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let token = bearer
        .or_else(|| headers.get(AUTH_TOKEN_HEADER).and_then(|h| h.to_str().ok()))?
        .trim();

    (!token.is_empty()).then_some(token)
}
