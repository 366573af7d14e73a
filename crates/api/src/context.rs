use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use bizdesk_auth::{CurrentCompany, FlashLevel, FlashMessage, Principal, Session, SessionToken, TenantMembership};
use bizdesk_companies::{Company, Membership, MembershipActor, SessionCompany};
use bizdesk_core::{CompanyId, UserId};

/// Tenant context for a request.
///
/// Attached by the tenant middleware once the company and an active
/// membership of the signed-in user are known. Immutable for the request.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantContext {
    user_id: UserId,
    company: Company,
    membership: Membership,
}

impl TenantContext {
    pub fn new(user_id: UserId, company: Company, membership: Membership) -> Self {
        Self { user_id, company, membership }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn company(&self) -> &Company {
        &self.company
    }

    pub fn company_id(&self) -> CompanyId {
        self.company.id
    }

    pub fn slug(&self) -> &str {
        &self.company.slug
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn grant(&self) -> TenantMembership {
        self.membership.grant()
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            active_company_id: self.company.id,
            membership: self.grant(),
        }
    }

    pub fn actor(&self) -> MembershipActor {
        self.membership.as_actor()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SessionState {
    session: Option<Session>,
    loaded_token: Option<SessionToken>,
    ttl: Duration,
    dirty: bool,
    ended: bool,
}

/// What the session middleware must persist after the handler ran.
#[derive(Debug, Default, PartialEq)]
pub struct SessionCommit {
    pub delete: Option<SessionToken>,
    pub save: Option<Session>,
    /// The token the client must hold from now on; `Some(None)` clears it.
    pub cookie: Option<Option<SessionToken>>,
}

/// Per-request handle to the server-side session.
///
/// Shared between the session middleware and handlers; changes are written
/// back once the response is ready.
#[derive(Debug, Clone)]
pub struct SessionContext {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionContext {
    pub fn new(session: Option<Session>, ttl: Duration) -> Self {
        let loaded_token = session.as_ref().map(|s| s.token.clone());
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                session,
                loaded_token,
                ttl,
                dirty: false,
                ended: false,
            })),
        }
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.inner.lock().await.session.as_ref().and_then(|s| s.user_id)
    }

    pub async fn current_company(&self) -> Option<CurrentCompany> {
        self.inner.lock().await.session.as_ref().and_then(|s| s.current_company.clone())
    }

    /// Replace the session with a fresh authenticated one.
    ///
    /// Pending messages carry over; the old token is invalidated.
    pub async fn login(&self, user_id: UserId, company: Option<&Company>) -> SessionToken {
        let mut state = self.inner.lock().await;
        let messages = state.session.take().map(|s| s.messages).unwrap_or_default();
        let mut session = Session::start(Some(user_id), Utc::now(), state.ttl);
        session.messages = messages;
        if let Some(company) = company {
            session.set_current_company(company.id, company.slug.clone());
        }
        let token = session.token.clone();
        state.session = Some(session);
        state.ended = true;
        state.dirty = true;
        token
    }

    pub async fn logout(&self) {
        let mut state = self.inner.lock().await;
        state.session = None;
        state.ended = true;
        state.dirty = true;
    }

    pub async fn flash(&self, level: FlashLevel, text: impl Into<String>) {
        let mut state = self.inner.lock().await;
        let ttl = state.ttl;
        state
            .session
            .get_or_insert_with(|| Session::start(None, Utc::now(), ttl))
            .flash(level, text);
        state.dirty = true;
    }

    pub async fn drain_messages(&self) -> Vec<FlashMessage> {
        let mut state = self.inner.lock().await;
        let messages = match state.session.as_mut() {
            Some(session) => session.drain_messages(),
            None => Vec::new(),
        };
        if !messages.is_empty() {
            state.dirty = true;
        }
        messages
    }

    /// Apply the tenant resolver's verdict on the remembered company.
    pub async fn apply_company(&self, change: SessionCompany) {
        let mut state = self.inner.lock().await;
        let Some(session) = state.session.as_mut() else {
            return;
        };
        match change {
            SessionCompany::Unchanged => return,
            SessionCompany::Set(current) => session.set_current_company(current.id, current.slug),
            SessionCompany::Cleared => session.clear_current_company(),
        }
        state.dirty = true;
    }

    pub async fn commit(&self) -> SessionCommit {
        let state = self.inner.lock().await;
        let mut commit = SessionCommit::default();
        if state.ended {
            commit.delete = state.loaded_token.clone();
        }
        if state.dirty {
            commit.save = state.session.clone();
        }

        let current = state.session.as_ref().map(|s| s.token.clone());
        if current != state.loaded_token {
            commit.cookie = Some(current);
        }
        commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ttl() -> Duration {
        Duration::hours(1)
    }

    #[tokio::test]
    async fn untouched_session_commits_nothing() {
        let session = Session::start(Some(UserId::new()), Utc::now(), ttl());
        let ctx = SessionContext::new(Some(session), ttl());
        assert_eq!(ctx.commit().await, SessionCommit::default());
    }

    #[tokio::test]
    async fn flash_without_session_starts_anonymous_one() {
        let ctx = SessionContext::new(None, ttl());
        ctx.flash(FlashLevel::Info, "hello").await;

        let commit = ctx.commit().await;
        let saved = commit.save.expect("anonymous session saved");
        assert!(saved.user_id.is_none());
        assert_eq!(saved.messages.len(), 1);
        assert_eq!(commit.cookie, Some(Some(saved.token.clone())));
        assert!(commit.delete.is_none());
    }

    #[tokio::test]
    async fn login_rotates_token_and_keeps_messages() {
        let anonymous = Session::start(None, Utc::now(), ttl());
        let old = anonymous.token.clone();
        let ctx = SessionContext::new(Some(anonymous), ttl());
        ctx.flash(FlashLevel::Success, "welcome").await;

        let user = UserId::new();
        let token = ctx.login(user, None).await;
        assert_ne!(token, old);
        assert_eq!(ctx.user_id().await, Some(user));

        let commit = ctx.commit().await;
        assert_eq!(commit.delete, Some(old));
        assert_eq!(commit.save.map(|s| s.messages.len()), Some(1));
        assert_eq!(commit.cookie, Some(Some(token)));
    }

    #[tokio::test]
    async fn logout_deletes_and_clears_cookie() {
        let session = Session::start(Some(UserId::new()), Utc::now(), ttl());
        let token = session.token.clone();
        let ctx = SessionContext::new(Some(session), ttl());
        ctx.logout().await;

        let commit = ctx.commit().await;
        assert_eq!(commit.delete, Some(token));
        assert!(commit.save.is_none());
        assert_eq!(commit.cookie, Some(None));
    }

    #[tokio::test]
    async fn resolver_changes_update_remembered_company() {
        let session = Session::start(Some(UserId::new()), Utc::now(), ttl());
        let ctx = SessionContext::new(Some(session), ttl());
        let current = CurrentCompany { id: CompanyId::new(), slug: "acme".into() };

        ctx.apply_company(SessionCompany::Set(current.clone())).await;
        assert_eq!(ctx.current_company().await, Some(current));

        ctx.apply_company(SessionCompany::Cleared).await;
        assert_eq!(ctx.current_company().await, None);
        assert!(ctx.commit().await.save.is_some());
    }
}
