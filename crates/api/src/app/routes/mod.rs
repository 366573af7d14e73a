use axum::{Router, routing::get};

pub mod api_auth;
pub mod api_users;
pub mod common;
pub mod companies;
pub mod menu;
pub mod rbac;
pub mod sections;
pub mod system;
pub mod users;

/// Router for every page and API endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .merge(companies::router())
        .merge(users::router())
        .merge(menu::router())
        .merge(sections::router())
        .merge(api_auth::router())
        .merge(api_users::router())
        .merge(rbac::router())
}
