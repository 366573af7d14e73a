//! Request extractors shared by page and API handlers.

use axum::{
    Form, Json, async_trait,
    extract::{FromRequest, FromRequestParts, OriginalUri, Request},
    http::{header, request::Parts},
};
use serde::de::DeserializeOwned;

use bizdesk_companies::{COMPANIES_ROOT, encode_slug, slug_from_path};

use crate::app::errors::{ApiError, PageError};
use crate::context::TenantContext;

/// Body decoded from JSON or from an urlencoded form, by content type.
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            Ok(Self(value))
        }
    }
}

fn request_path(parts: &Parts) -> String {
    match parts.extensions.get::<OriginalUri>() {
        Some(OriginalUri(uri)) => uri.path().to_string(),
        None => parts.uri.path().to_string(),
    }
}

/// Tenant of a company page.
///
/// Without a tenant the user is sent to the company's login page; a slug
/// in the path that differs from the resolved company is a 404.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub TenantContext);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let path = request_path(parts);
        let path_slug = slug_from_path(&path);
        match parts.extensions.get::<TenantContext>() {
            Some(tenant) if path_slug.as_deref().is_some_and(|slug| slug != tenant.slug()) => {
                Err(PageError::Api(ApiError::NotFound))
            }
            Some(tenant) => Ok(Self(tenant.clone())),
            None => Err(match path_slug {
                Some(slug) => PageError::redirect(format!("{COMPANIES_ROOT}{}/", encode_slug(&slug))),
                None => PageError::redirect(COMPANIES_ROOT),
            }),
        }
    }
}

/// Tenant of an API call.
#[derive(Debug, Clone)]
pub struct ApiTenant(pub TenantContext);

#[async_trait]
impl<S> FromRequestParts<S> for ApiTenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(Self)
            .ok_or(ApiError::NoCompany)
    }
}
