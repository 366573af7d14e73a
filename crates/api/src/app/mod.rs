//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: operations shared by pages and the REST API
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `extract.rs`: body and tenant extractors
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use bizdesk_infra::Store;

use crate::config::Config;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: Config, store: Arc<dyn Store>) -> Router {
    let services = Arc::new(services::build_services(config, store));

    routes::router()
        .layer(Extension(services.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    services.clone(),
                    middleware::session_middleware,
                ))
                .layer(axum::middleware::from_fn_with_state(services, middleware::tenant_middleware)),
        )
}
