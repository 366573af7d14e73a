//! Company user-management pages.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
};
use serde_json::json;

use bizdesk_auth::FlashLevel;

use crate::app::dto::{self, InviteRequest, MemberUpdateRequest, ProfileUpdateRequest, UserListQuery};
use crate::app::errors::PageError;
use crate::app::extract::{CurrentTenant, FormOrJson};
use crate::app::routes::common::{page_user_id, redirect_with, render};
use crate::app::services::AppServices;
use crate::context::{SessionContext, TenantContext};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/companies/:slug/users/", get(list_users))
        .route("/companies/:slug/users/create/", post(create_user))
        .route("/companies/:slug/users/profile/edit/", get(profile_page).post(update_profile))
        .route("/companies/:slug/users/:user_id/edit/", post(edit_user))
        .route("/companies/:slug/users/:user_id/delete/", post(delete_user))
}

fn users_path(tenant: &TenantContext) -> String {
    format!("{}/users/", tenant.company().base_path())
}

fn profile_path(tenant: &TenantContext) -> String {
    format!("{}/users/profile/edit/", tenant.company().base_path())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    Query(query): Query<UserListQuery>,
) -> Result<Response, PageError> {
    let members = services.visible_members(&tenant, &query).await.map_err(PageError::within(&tenant))?;
    let grant = tenant.grant();
    let page = json!({
        "company": dto::company_summary_to_json(tenant.company()),
        "users": members.iter().map(dto::member_to_json).collect::<Vec<_>>(),
        "can_manage_users": grant.capabilities.can_manage_users,
        "can_invite": grant.can_invite_users(),
        "filters": {
            "is_active": query.is_active,
            "q": query.q,
            "department": query.department,
            "position": query.position,
            "ordering": query.ordering,
        },
    });
    Ok(render(&session, page).await)
}

async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    FormOrJson(request): FormOrJson<InviteRequest>,
) -> Result<Response, PageError> {
    let invitation = services.invite_member(&tenant, &request).await.map_err(PageError::within(&tenant))?;
    let username = &invitation.record.account.username;
    let message = match &invitation.temporary_password {
        Some(password) => format!("User {username} created. Temporary password: {password}"),
        None => format!("User {username} added to the company."),
    };
    Ok(redirect_with(&session, &users_path(&tenant), FlashLevel::Success, message).await)
}

async fn edit_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, user_id)): Path<(String, String)>,
    FormOrJson(request): FormOrJson<MemberUpdateRequest>,
) -> Result<Response, PageError> {
    let user_id = page_user_id(&user_id)?;
    let record = services
        .update_member(&tenant, user_id, &request)
        .await
        .map_err(PageError::within(&tenant))?;
    let message = format!("User {} updated.", record.account.username);
    Ok(redirect_with(&session, &users_path(&tenant), FlashLevel::Success, message).await)
}

async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, user_id)): Path<(String, String)>,
) -> Result<Response, PageError> {
    let user_id = page_user_id(&user_id)?;
    let account = services.remove_member(&tenant, user_id).await.map_err(PageError::within(&tenant))?;
    let message = format!("User {} removed from the company.", account.username);
    Ok(redirect_with(&session, &users_path(&tenant), FlashLevel::Success, message).await)
}

async fn profile_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<Response, PageError> {
    let record = services
        .member(&tenant, tenant.user_id())
        .await
        .map_err(PageError::within(&tenant))?;
    let page = json!({
        "company": dto::company_summary_to_json(tenant.company()),
        "user": dto::member_to_json(&record),
    });
    Ok(render(&session, page).await)
}

async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    FormOrJson(profile): FormOrJson<ProfileUpdateRequest>,
) -> Result<Response, PageError> {
    let request = MemberUpdateRequest { profile, ..Default::default() };
    services
        .update_member(&tenant, tenant.user_id(), &request)
        .await
        .map_err(PageError::within(&tenant))?;
    Ok(redirect_with(&session, &profile_path(&tenant), FlashLevel::Success, "Profile updated.").await)
}
