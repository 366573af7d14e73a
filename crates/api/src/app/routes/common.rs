use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::Value;

use bizdesk_auth::FlashLevel;
use bizdesk_companies::{COMPANIES_ROOT, encode_slug};
use bizdesk_core::{MenuSectionId, UserId};

use crate::app::dto;
use crate::app::errors::{ApiError, PageError};
use crate::context::SessionContext;

/// Render a page context, consuming pending flash messages.
pub async fn render(session: &SessionContext, mut page: Value) -> Response {
    let messages = session.drain_messages().await;
    if let Some(fields) = page.as_object_mut() {
        fields.insert("messages".into(), dto::messages_to_json(&messages));
    }
    (StatusCode::OK, Json(page)).into_response()
}

/// `303 See Other` after a successful form post, with a message for the next page.
pub async fn redirect_with(
    session: &SessionContext,
    location: &str,
    level: FlashLevel,
    text: impl Into<String>,
) -> Response {
    session.flash(level, text).await;
    Redirect::to(location).into_response()
}

pub fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse::<UserId>().map_err(|_| ApiError::BadRequest("invalid user id".into()))
}

pub fn parse_section_id(raw: &str) -> Result<MenuSectionId, ApiError> {
    raw.parse::<MenuSectionId>().map_err(|_| ApiError::NotFound)
}

/// Page variant: an unknown id in a page URL is a 404.
pub fn page_user_id(raw: &str) -> Result<UserId, PageError> {
    raw.parse::<UserId>().map_err(|_| PageError::Api(ApiError::NotFound))
}

/// Company login page of `slug`, or selection when no slug is known.
pub fn login_location(slug: Option<&str>) -> String {
    match slug {
        Some(slug) => format!("{COMPANIES_ROOT}{}/", encode_slug(slug)),
        None => COMPANIES_ROOT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_or_fail_softly() {
        assert!(parse_user_id("not-a-uuid").is_err());
        let id = UserId::new();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_section_id("x"), Err(ApiError::NotFound)));
    }

    #[test]
    fn login_location_falls_back_to_selection() {
        assert_eq!(login_location(Some("acme")), "/companies/acme/");
        assert_eq!(login_location(None), "/companies/");
        assert_eq!(login_location(Some("рога")), "/companies/%D1%80%D0%BE%D0%B3%D0%B0/");
    }
}
