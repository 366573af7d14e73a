//! Tenant-scoped work-area pages (orders, products, suppliers, departments, reports).

use axum::{Router, extract::Extension, response::Response, routing::get};
use serde_json::json;

use bizdesk_auth::Capability;

use crate::app::dto;
use crate::app::errors::PageError;
use crate::app::extract::CurrentTenant;
use crate::app::routes::common::render;
use crate::authz;
use crate::context::{SessionContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/companies/:slug/orders/", get(orders))
        .route("/companies/:slug/products/", get(products))
        .route("/companies/:slug/suppliers/", get(suppliers))
        .route("/companies/:slug/departments/", get(departments))
        .route("/companies/:slug/reports/", get(reports))
}

async fn section_page(session: &SessionContext, tenant: &TenantContext, section: &str, title: &str) -> Response {
    let page = json!({
        "company": dto::company_summary_to_json(tenant.company()),
        "membership": dto::membership_to_json(tenant.membership()),
        "section": section,
        "title": title,
    });
    render(session, page).await
}

async fn orders(Extension(session): Extension<SessionContext>, CurrentTenant(tenant): CurrentTenant) -> Response {
    section_page(&session, &tenant, "orders", "Orders").await
}

async fn products(Extension(session): Extension<SessionContext>, CurrentTenant(tenant): CurrentTenant) -> Response {
    section_page(&session, &tenant, "products", "Products").await
}

async fn suppliers(Extension(session): Extension<SessionContext>, CurrentTenant(tenant): CurrentTenant) -> Response {
    section_page(&session, &tenant, "suppliers", "Suppliers").await
}

async fn departments(
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
) -> Response {
    section_page(&session, &tenant, "departments", "Departments").await
}

async fn reports(
    Extension(session): Extension<SessionContext>,
    CurrentTenant(tenant): CurrentTenant,
) -> Result<Response, PageError> {
    authz::require_capability(&tenant, Capability::ViewReports)
        .map_err(|_| PageError::redirect_with(tenant.company().dashboard_path(), authz::REPORTS_DENIED))?;
    Ok(section_page(&session, &tenant, "reports", "Reports").await)
}
