use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde_json::json;
use thiserror::Error;

use bizdesk_auth::{AuthzError, FlashLevel, FlashMessage};
use bizdesk_core::{DomainError, FieldErrors};
use bizdesk_infra::StoreError;

use crate::context::TenantContext;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Failure of an API call or a service operation.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("select a company first")]
    NoCompany,

    #[error("{0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("invalid input: {0}")]
    Form(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// A single form error not tied to a field.
    pub fn non_field(message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add_non_field(message);
        Self::Form(errors)
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        Self::Form(errors)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        if !err.is_user_error() {
            tracing::info!(error = %err, "domain rule rejected request");
        }
        match err {
            DomainError::Form(errors) => Self::Form(errors),
            DomainError::Invalid(msg) => Self::BadRequest(msg),
            DomainError::Invariant(msg) => Self::Invariant(msg),
            DomainError::NotFound => Self::NotFound,
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Store(other),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        Self::Forbidden(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated => {
                json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required")
            }
            ApiError::InvalidCredentials => {
                json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid username or password")
            }
            ApiError::NoCompany => json_error(StatusCode::FORBIDDEN, "no_company", "select a company first"),
            ApiError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
            ApiError::Form(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(json!({ "errors": errors }))).into_response()
            }
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
            ApiError::Invariant(msg) => {
                json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
            }
            ApiError::Store(StoreError::Unavailable(msg)) => {
                tracing::error!(error = %msg, "store unavailable");
                json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", "storage is unavailable")
            }
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal error")
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Page errors
// ─────────────────────────────────────────────────────────────────────────────

/// A flash message the session middleware stores with the session.
#[derive(Debug, Clone)]
pub struct PendingFlash(pub FlashMessage);

/// Failure of a page handler.
///
/// Permission failures send the user elsewhere with a message instead of a
/// hard error; everything else renders like the API.
#[derive(Debug)]
pub enum PageError {
    Redirect { location: String, message: Option<String> },
    Api(ApiError),
}

impl PageError {
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect { location: location.into(), message: None }
    }

    pub fn redirect_with(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Redirect { location: location.into(), message: Some(message.into()) }
    }

    /// Map service failures inside a company: denials go back to the dashboard.
    pub fn within(tenant: &TenantContext) -> impl Fn(ApiError) -> PageError + '_ {
        move |err| match err {
            ApiError::Forbidden(msg) => PageError::redirect_with(tenant.company().dashboard_path(), msg),
            other => PageError::Api(other),
        }
    }
}

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

impl From<StoreError> for PageError {
    fn from(err: StoreError) -> Self {
        Self::Api(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Redirect { location, message } => {
                let mut response = Redirect::to(&location).into_response();
                if let Some(text) = message {
                    response
                        .extensions_mut()
                        .insert(PendingFlash(FlashMessage { level: FlashLevel::Error, text }));
                }
                response
            }
            PageError::Api(err) => err.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_surface_as_conflicts() {
        let err: ApiError = StoreError::Conflict("duplicate".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn form_errors_are_unprocessable() {
        let err: ApiError = DomainError::Form(FieldErrors::new()).into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn page_redirect_carries_flash() {
        let response = PageError::redirect_with("/companies/", "nope").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let flash = response.extensions().get::<PendingFlash>().expect("flash attached");
        assert_eq!(flash.0.text, "nope");
        assert_eq!(flash.0.level, FlashLevel::Error);
    }
}
