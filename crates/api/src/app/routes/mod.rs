use axum::{routing::get, Router};

pub mod admin;
pub mod auth;
pub mod common;
pub mod messages;
pub mod parcels;
pub mod stations;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/admin", admin::public_router())
        .nest("/stations", stations::public_router())
        .nest("/parcels", parcels::public_router())
}

/// Endpoints behind the auth middleware.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/auth", auth::router())
        .nest("/stations", stations::router())
        .nest("/users", users::router())
        .nest("/parcels", parcels::router())
        .nest("/messages", messages::router())
        .nest("/admin", admin::router())
}
