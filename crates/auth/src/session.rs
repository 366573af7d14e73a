use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bizdesk_core::{CompanyId, UserId};

/// Length of the opaque session token.
pub const SESSION_TOKEN_LEN: usize = 48;

/// Opaque server-side session key (cookie value or bearer token).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(Alphanumeric.sample_string(&mut rand::thread_rng(), SESSION_TOKEN_LEN))
    }

    pub fn from_string(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The company the session user last entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCompany {
    pub id: CompanyId,
    pub slug: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

/// Server-side session record.
///
/// `user_id` is `None` for anonymous sessions that only carry flash messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: Option<UserId>,
    pub current_company: Option<CurrentCompany>,
    pub messages: Vec<FlashMessage>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Expiry saturates at the largest representable time.
    pub fn start(user_id: Option<UserId>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token: SessionToken::generate(),
            user_id,
            current_company: None,
            messages: Vec::new(),
            issued_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn set_current_company(&mut self, id: CompanyId, slug: impl Into<String>) {
        self.current_company = Some(CurrentCompany { id, slug: slug.into() });
    }

    pub fn clear_current_company(&mut self) {
        self.current_company = None;
    }

    pub fn flash(&mut self, level: FlashLevel, text: impl Into<String>) {
        self.messages.push(FlashMessage { level, text: text.into() });
    }

    /// Take all pending messages; they are shown once.
    pub fn drain_messages(&mut self) -> Vec<FlashMessage> {
        std::mem::take(&mut self.messages)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate a session's time window.
pub fn validate_session(session: &Session, now: DateTime<Utc>) -> Result<(), SessionValidationError> {
    if session.expires_at <= session.issued_at {
        return Err(SessionValidationError::InvalidTimeWindow);
    }
    if now < session.issued_at {
        return Err(SessionValidationError::NotYetValid);
    }
    if now >= session.expires_at {
        return Err(SessionValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_at(now: DateTime<Utc>) -> Session {
        Session::start(Some(UserId::new()), now, Duration::hours(1))
    }

    #[test]
    fn fresh_session_is_valid() {
        let now = Utc::now();
        assert_eq!(validate_session(&session_at(now), now), Ok(()));
    }

    #[test]
    fn huge_ttl_saturates_instead_of_overflowing() {
        let now = Utc::now();
        let s = Session::start(None, now, Duration::MAX);
        assert_eq!(s.expires_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(validate_session(&s, now), Ok(()));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        let s = session_at(now);
        assert_eq!(validate_session(&s, s.expires_at), Err(SessionValidationError::Expired));
    }

    #[test]
    fn future_issued_at_is_rejected() {
        let now = Utc::now();
        let s = session_at(now);
        assert_eq!(
            validate_session(&s, now - Duration::seconds(1)),
            Err(SessionValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let mut s = session_at(now);
        s.expires_at = s.issued_at;
        assert_eq!(validate_session(&s, now), Err(SessionValidationError::InvalidTimeWindow));
    }

    #[test]
    fn messages_are_drained_once() {
        let mut s = session_at(Utc::now());
        s.flash(FlashLevel::Success, "Saved");
        assert_eq!(s.drain_messages().len(), 1);
        assert!(s.drain_messages().is_empty());
    }

    #[test]
    fn tokens_are_random_and_sized() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_eq!(a.as_str().len(), SESSION_TOKEN_LEN);
        assert_ne!(a, b);
    }
}
