//! REST endpoints for company members and their profiles.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::app::dto::{self, InviteRequest, MemberUpdateRequest, ProfileUpdateRequest, UserListQuery};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiTenant, FormOrJson};
use crate::app::routes::common::parse_user_id;
use crate::app::services::AppServices;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/api/v1/users/", get(list_users).post(create_user))
        .route("/api/v1/users/me", get(me))
        .route("/api/v1/users/profiles/me", get(my_profile).patch(update_my_profile))
        .route("/api/v1/users/:id", get(get_user).patch(update_user).delete(delete_user))
        .route("/api/v1/users/:id/activate", post(activate_user))
        .route("/api/v1/users/:id/deactivate", post(deactivate_user))
        .route("/api/v1/users/:id/reset_password", post(reset_password))
}

// ─────────────────────────────────────────────────────────────────────────────
// Members
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/users/ - members visible to the caller
async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Value>, ApiError> {
    let members = services.visible_members(&tenant, &query).await?;
    let items: Vec<Value> = members.iter().map(dto::member_to_json).collect();
    Ok(Json(json!({ "count": items.len(), "items": items })))
}

/// POST /api/v1/users/ - invite a user into the company
async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    FormOrJson(request): FormOrJson<InviteRequest>,
) -> Result<Response, ApiError> {
    let invitation = services.invite_member(&tenant, &request).await?;
    let body = json!({
        "user": dto::member_to_json(&invitation.record),
        "temp_password": invitation.temporary_password,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
) -> Result<Json<Value>, ApiError> {
    let record = services.member(&tenant, tenant.user_id()).await?;
    let mut body = dto::member_to_json(&record);
    if let Some(fields) = body.as_object_mut() {
        fields.insert("company".into(), dto::company_to_json(tenant.company()));
    }
    Ok(Json(body))
}

async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = services.member(&tenant, parse_user_id(&id)?).await?;
    Ok(Json(dto::member_to_json(&record)))
}

async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    Path(id): Path<String>,
    FormOrJson(request): FormOrJson<MemberUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let record = services.update_member(&tenant, parse_user_id(&id)?, &request).await?;
    Ok(Json(dto::member_to_json(&record)))
}

/// DELETE /api/v1/users/:id - remove the membership (the account stays)
async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services.remove_member(&tenant, parse_user_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = services.set_member_active(&tenant, parse_user_id(&id)?, true).await?;
    Ok(Json(dto::member_to_json(&record)))
}

async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = services.set_member_active(&tenant, parse_user_id(&id)?, false).await?;
    Ok(Json(dto::member_to_json(&record)))
}

async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let password = services.reset_password(&tenant, parse_user_id(&id)?).await?;
    Ok(Json(json!({ "temp_password": password })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Own profile
// ─────────────────────────────────────────────────────────────────────────────

async fn my_profile(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
) -> Result<Json<Value>, ApiError> {
    let record = services.member(&tenant, tenant.user_id()).await?;
    Ok(Json(dto::profile_to_json(&record.profile)))
}

async fn update_my_profile(
    Extension(services): Extension<Arc<AppServices>>,
    ApiTenant(tenant): ApiTenant,
    FormOrJson(profile): FormOrJson<ProfileUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let request = MemberUpdateRequest { profile, ..Default::default() };
    let record = services.update_member(&tenant, tenant.user_id(), &request).await?;
    Ok(Json(dto::profile_to_json(&record.profile)))
}
