use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;

use bizdesk_auth::{SessionToken, validate_session};
use bizdesk_companies::{COMPANIES_ROOT, Resolution, ResolveRequest};

use crate::app::errors::{ApiError, PageError, PendingFlash};
use crate::app::services::AppServices;
use crate::context::{SessionContext, TenantContext};

pub const SESSION_COOKIE: &str = "bizdesk_session";

/// Load the server-side session, expose it to handlers and persist changes.
pub async fn session_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let loaded = match session_token(req.headers()) {
        Some(token) => restore_session(&services, &token).await,
        None => None,
    };

    let ctx = SessionContext::new(loaded, services.config.session_ttl());
    req.extensions_mut().insert(ctx.clone());

    let mut response = next.run(req).await;

    if let Some(PendingFlash(message)) = response.extensions_mut().remove::<PendingFlash>() {
        ctx.flash(message.level, message.text).await;
    }

    let commit = ctx.commit().await;
    if let Some(token) = &commit.delete {
        if let Err(err) = services.store.delete_session(token).await {
            tracing::error!(error = %err, "failed to delete session");
        }
    }
    if let Some(session) = &commit.save {
        if let Err(err) = services.store.save_session(session).await {
            tracing::error!(error = %err, "failed to save session");
            return ApiError::from(err).into_response();
        }
    }
    if let Some(token) = commit.cookie {
        let cookie = session_cookie(token.as_ref(), services.config.cookie_secure);
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => tracing::error!(error = %err, "invalid session cookie header"),
        }
    }

    response
}

async fn restore_session(services: &AppServices, token: &SessionToken) -> Option<bizdesk_auth::Session> {
    let session = match services.store.load_session(token).await {
        Ok(session) => session?,
        Err(err) => {
            tracing::error!(error = %err, "failed to load session");
            return None;
        }
    };

    if let Err(err) = validate_session(&session, Utc::now()) {
        tracing::debug!(error = %err, "discarding session");
        if let Err(err) = services.store.delete_session(token).await {
            tracing::error!(error = %err, "failed to delete stale session");
        }
        return None;
    }
    Some(session)
}

/// Resolve the company of the request and attach [`TenantContext`].
pub async fn tenant_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let session = req.extensions().get::<SessionContext>().cloned();
    let (user_id, remembered) = match &session {
        Some(ctx) => (ctx.user_id().await, ctx.current_company().await),
        None => (None, None),
    };

    let request = ResolveRequest { path: &path, user_id, session_company: remembered.as_ref() };
    let outcome = match services.resolver.resolve(services.store.as_ref(), request).await {
        Ok(outcome) => outcome,
        Err(err) => return ApiError::from(err).into_response(),
    };

    if let Some(ctx) = &session {
        ctx.apply_company(outcome.session).await;
    }

    let api = path.starts_with("/api/");
    match outcome.resolution {
        Resolution::Pass => next.run(req).await,
        Resolution::Attached { company, membership } => {
            let Some(user_id) = user_id else {
                return PageError::redirect(COMPANIES_ROOT).into_response();
            };
            req.extensions_mut().insert(TenantContext::new(user_id, company, membership));
            next.run(req).await
        }
        Resolution::LoginRequired if api => ApiError::Unauthenticated.into_response(),
        Resolution::LoginRequired => PageError::redirect(COMPANIES_ROOT).into_response(),
        Resolution::Redirect { message, .. } if api => match message {
            Some(message) => ApiError::forbidden(message).into_response(),
            None => ApiError::NoCompany.into_response(),
        },
        Resolution::Redirect { location, message } => PageError::Redirect { location, message }.into_response(),
    }
}

/// Session token from the cookie, or a bearer token for API clients.
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    if let Some(cookie) = CookieJar::from_headers(headers).get(SESSION_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(SessionToken::from_string(value));
        }
    }
    extract_bearer(headers).map(SessionToken::from_string)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// `Set-Cookie` value for a new token, or a removal cookie for `None`.
fn session_cookie(token: Option<&SessionToken>, secure: bool) -> Cookie<'static> {
    let value = token.map(|t| t.as_str().to_string()).unwrap_or_default();
    let mut cookie = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build();
    if token.is_none() {
        cookie.make_removal();
    }
    cookie
}
