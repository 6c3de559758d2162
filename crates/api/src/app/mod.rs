//! HTTP application wiring.
//!
//! - `services.rs`: store, OTP channels, image storage and the operations handlers call
//! - `routes/`: HTTP handlers, one file per area
//! - `dto.rs`: request bodies and response views
//! - `errors.rs`: JSON error responses

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Extension, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router from configuration (used by `main.rs`).
pub async fn build_app(config: AppConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(build_app_with(Arc::new(services)))
}

/// Build the router around already-wired services.
pub fn build_app_with(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        jwt: services.jwt.clone(),
        store: services.store.clone(),
    };

    // Protected routes: token plus a live account behind it.
    let protected = routes::protected_router().route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));
    let api = routes::public_router().merge(protected);

    let body_limit = services.config.max_upload_bytes;
    let uploads = ServeDir::new(services.images.root());

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api)
        .nest_service("/uploads", uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(Extension(services)),
        )
}
