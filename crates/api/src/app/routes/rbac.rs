//! Role catalogue for API clients.

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use bizdesk_auth::role_registry;

use crate::app::extract::ApiTenant;

pub fn router() -> Router {
    Router::new().route("/api/v1/roles", get(list_roles))
}

/// GET /api/v1/roles - every role with its capability bundle
async fn list_roles(ApiTenant(tenant): ApiTenant) -> Json<Value> {
    tracing::debug!(user_id = %tenant.user_id(), company = %tenant.slug(), "roles listed");
    Json(json!({
        "roles": role_registry(),
        "current": tenant.membership().role(),
    }))
}
