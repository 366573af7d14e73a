//! Token login for REST clients.
//!
//! The returned token is the server-side session key; clients send it as
//! `Authorization: Bearer <token>` (the session cookie works as well).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};

use crate::app::dto::{self, ApiLoginRequest};
use crate::app::errors::ApiError;
use crate::app::extract::FormOrJson;
use crate::app::services::AppServices;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
}

async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    FormOrJson(request): FormOrJson<ApiLoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (account, company) = services
        .api_login(&request.username, &request.password, request.company_slug.as_deref())
        .await?;
    let token = session.login(account.id, company.as_ref()).await;

    Ok(Json(json!({
        "token": token.as_str(),
        "user": dto::account_to_json(&account),
        "company": company.as_ref().map(dto::company_to_json),
    })))
}

async fn logout(Extension(session): Extension<SessionContext>) -> Response {
    session.logout().await;
    StatusCode::NO_CONTENT.into_response()
}
