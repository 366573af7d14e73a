//! Company pages: selection, registration, login/logout, dashboard, settings.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde_json::json;

use bizdesk_auth::FlashLevel;
use bizdesk_companies::{COMPANIES_ROOT, Company, RegistrationInput};
use bizdesk_core::FieldErrors;

use crate::app::dto::{self, LoginRequest, SelectCompanyRequest, SettingsUpdateRequest};
use crate::app::errors::{ApiError, PageError};
use crate::app::extract::{CurrentTenant, FormOrJson};
use crate::app::routes::common::{login_location, redirect_with, render};
use crate::app::services::AppServices;
use crate::context::{SessionContext, TenantContext};

const UNKNOWN_COMPANY: &str = "Company not found or inactive.";
const LOGGED_OUT: &str = "You have been logged out.";
const SETTINGS_SAVED: &str = "Company settings saved.";

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/companies/", get(selection_page).post(select_company))
        .route("/companies/register/", get(registration_page).post(register))
        .route("/companies/:slug/", get(login_page).post(login))
        .route("/companies/:slug/dashboard/", get(dashboard))
        .route("/companies/:slug/settings/", get(settings_page).post(update_settings))
        .route("/companies/:slug/users/logout/", post(company_logout))
        .route("/logout/", post(logout))
}

// ─────────────────────────────────────────────────────────────────────────────
// Selection
// ─────────────────────────────────────────────────────────────────────────────

async fn find_company(services: &AppServices, slug: Option<&str>) -> Result<Company, ApiError> {
    let slug = slug.map(str::trim).filter(|s| !s.is_empty());
    let company = match slug {
        Some(slug) => services.active_company(slug).await?,
        None => None,
    };
    company.ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.add("company_slug", UNKNOWN_COMPANY);
        ApiError::Form(errors)
    })
}

async fn selection_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<SelectCompanyRequest>,
) -> Result<Response, ApiError> {
    let mut errors = None;
    if query.company_slug.is_some() {
        match find_company(&services, query.company_slug.as_deref()).await {
            Ok(company) => return Ok(Redirect::to(&company.login_path()).into_response()),
            Err(ApiError::Form(found)) => errors = Some(found),
            Err(err) => return Err(err),
        }
    }

    let companies = services.selectable_companies().await?;
    let page = json!({
        "companies": companies.iter().map(dto::company_summary_to_json).collect::<Vec<_>>(),
        "authenticated": session.user_id().await.is_some(),
        "errors": errors,
    });
    Ok(render(&session, page).await)
}

async fn select_company(
    Extension(services): Extension<Arc<AppServices>>,
    FormOrJson(request): FormOrJson<SelectCompanyRequest>,
) -> Result<Redirect, ApiError> {
    let company = find_company(&services, request.company_slug.as_deref()).await?;
    Ok(Redirect::to(&company.login_path()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

async fn registration_page(Extension(session): Extension<SessionContext>) -> Response {
    let authenticated = session.user_id().await.is_some();
    // Signed-in users register a company without creating a new account.
    let page = json!({
        "authenticated": authenticated,
        "account_fields_required": !authenticated,
    });
    render(&session, page).await
}

async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    FormOrJson(input): FormOrJson<RegistrationInput>,
) -> Result<Response, ApiError> {
    let registration = services.register_company(&input, session.user_id().await).await?;
    let company = &registration.company;
    session.login(registration.owner_id(), Some(company)).await;
    let message = format!("Company \"{}\" registered. Welcome!", company.name);
    Ok(redirect_with(&session, &company.dashboard_path(), FlashLevel::Success, message).await)
}

// ─────────────────────────────────────────────────────────────────────────────
// Login / logout
// ─────────────────────────────────────────────────────────────────────────────

async fn login_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    tenant: Option<Extension<TenantContext>>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    if let Some(Extension(tenant)) = tenant.filter(|Extension(t)| t.slug() == slug) {
        return Ok(Redirect::to(&tenant.company().dashboard_path()).into_response());
    }
    let company = services.active_company(&slug).await?.ok_or(ApiError::NotFound)?;
    let page = json!({ "company": dto::company_summary_to_json(&company) });
    Ok(render(&session, page).await)
}

async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(slug): Path<String>,
    FormOrJson(request): FormOrJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let company = services.active_company(&slug).await?.ok_or(ApiError::NotFound)?;
    let account = services.company_login(&company, &request.username, &request.password).await?;

    session.login(account.id, Some(&company)).await;
    let message = format!("Welcome, {}!", account.full_name());
    Ok(redirect_with(&session, &company.dashboard_path(), FlashLevel::Success, message).await)
}

async fn company_logout(Extension(session): Extension<SessionContext>, Path(slug): Path<String>) -> Response {
    end_session(&session, login_location(Some(&slug))).await
}

async fn logout(Extension(session): Extension<SessionContext>) -> Response {
    let location = match session.current_company().await {
        Some(current) => login_location(Some(&current.slug)),
        None => COMPANIES_ROOT.to_string(),
    };
    end_session(&session, location).await
}

async fn end_session(session: &SessionContext, location: String) -> Response {
    if let Some(user_id) = session.user_id().await {
        tracing::info!(user_id = %user_id, "user logged out");
    }
    session.logout().await;
    redirect_with(session, &location, FlashLevel::Info, LOGGED_OUT).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Dashboard and settings
// ─────────────────────────────────────────────────────────────────────────────

async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<Response, PageError> {
    let dashboard = services.dashboard(&tenant).await.map_err(PageError::within(&tenant))?;
    let slug = tenant.slug();
    let page = json!({
        "company": dto::company_to_json(tenant.company()),
        "membership": dto::membership_to_json(tenant.membership()),
        "user": dto::account_to_json(&dashboard.account),
        "active_members": dashboard.active_members,
        "menu": dashboard
            .menu
            .iter()
            .map(|section| dto::menu_section_to_json(section, slug))
            .collect::<Vec<_>>(),
    });
    Ok(render(&session, page).await)
}

async fn settings_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<Response, PageError> {
    let settings = services.settings(&tenant).await.map_err(PageError::within(&tenant))?;
    let page = json!({
        "company": dto::company_to_json(tenant.company()),
        "settings": dto::settings_to_json(&settings),
        "can_edit": tenant.grant().can_manage_company_settings(),
    });
    Ok(render(&session, page).await)
}

async fn update_settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    FormOrJson(request): FormOrJson<SettingsUpdateRequest>,
) -> Result<Response, PageError> {
    let (company, _) = services
        .update_settings(&tenant, &request)
        .await
        .map_err(PageError::within(&tenant))?;
    let location = format!("{}/settings/", company.base_path());
    Ok(redirect_with(&session, &location, FlashLevel::Success, SETTINGS_SAVED).await)
}
