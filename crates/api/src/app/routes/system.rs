use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use bizdesk_companies::COMPANIES_ROOT;

use crate::context::TenantContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// `/`: the current company's dashboard, or company selection.
pub async fn root(tenant: Option<Extension<TenantContext>>) -> Response {
    match tenant {
        Some(Extension(tenant)) => Redirect::to(&tenant.company().dashboard_path()).into_response(),
        None => Redirect::to(COMPANIES_ROOT).into_response(),
    }
}
