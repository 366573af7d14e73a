//! Menu management pages and the embedded-section (iframe) page.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    response::Response,
    routing::{get, post},
};
use serde_json::json;

use bizdesk_auth::FlashLevel;
use bizdesk_companies::{MENU_ICONS, MenuSectionInput};
use bizdesk_core::MenuSectionId;

use crate::app::dto;
use crate::app::errors::PageError;
use crate::app::extract::{CurrentTenant, FormOrJson};
use crate::app::routes::common::{parse_section_id, redirect_with, render};
use crate::app::services::AppServices;
use crate::context::{SessionContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/companies/:slug/menu/", get(menu_page).post(create_section))
        .route("/companies/:slug/menu/:id/edit/", post(edit_section))
        .route("/companies/:slug/menu/:id/delete/", post(delete_section))
        .route("/companies/:slug/iframe/:id/", get(iframe_page))
}

fn menu_path(tenant: &TenantContext) -> String {
    format!("{}/menu/", tenant.company().base_path())
}

fn section_id(raw: &str) -> Result<MenuSectionId, PageError> {
    parse_section_id(raw).map_err(PageError::from)
}

async fn menu_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<Response, PageError> {
    let sections = services.menu_sections(&tenant).await.map_err(PageError::within(&tenant))?;
    let page = json!({
        "company": dto::company_summary_to_json(tenant.company()),
        "sections": sections
            .iter()
            .map(|section| dto::menu_section_to_json(section, tenant.slug()))
            .collect::<Vec<_>>(),
        "icons": MENU_ICONS,
    });
    Ok(render(&session, page).await)
}

async fn create_section(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    FormOrJson(input): FormOrJson<MenuSectionInput>,
) -> Result<Response, PageError> {
    let section = services
        .create_menu_section(&tenant, &input)
        .await
        .map_err(PageError::within(&tenant))?;
    let message = format!("Section \"{}\" created.", section.title);
    Ok(redirect_with(&session, &menu_path(&tenant), FlashLevel::Success, message).await)
}

async fn edit_section(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, id)): Path<(String, String)>,
    FormOrJson(input): FormOrJson<MenuSectionInput>,
) -> Result<Response, PageError> {
    let id = section_id(&id)?;
    let section = services
        .update_menu_section(&tenant, id, &input)
        .await
        .map_err(PageError::within(&tenant))?;
    let message = format!("Section \"{}\" updated.", section.title);
    Ok(redirect_with(&session, &menu_path(&tenant), FlashLevel::Success, message).await)
}

async fn delete_section(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, id)): Path<(String, String)>,
) -> Result<Response, PageError> {
    let id = section_id(&id)?;
    let section = services
        .delete_menu_section(&tenant, id)
        .await
        .map_err(PageError::within(&tenant))?;
    let message = format!("Section \"{}\" deleted.", section.title);
    Ok(redirect_with(&session, &menu_path(&tenant), FlashLevel::Success, message).await)
}

async fn iframe_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
    Path((_, id)): Path<(String, String)>,
) -> Result<Response, PageError> {
    let id = section_id(&id)?;
    let section = services.iframe_section(&tenant, id).await.map_err(PageError::within(&tenant))?;
    let page = json!({
        "company": dto::company_summary_to_json(tenant.company()),
        "section": dto::menu_section_to_json(&section, tenant.slug()),
        "src": section.url,
    });
    Ok(render(&session, page).await)
}
