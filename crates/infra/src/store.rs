//! Storage interfaces.
//!
//! Every company-scoped query takes the `CompanyId` explicitly; there is no
//! call that reads another company's menu sections or memberships.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use bizdesk_auth::{Session, SessionToken, UserAccount, UserProfile};
use bizdesk_companies::{Company, CompanySettings, MenuSection, Membership, Registration, TenantDirectory};
use bizdesk_core::{CompanyId, ExpectedVersion, MenuSectionId, UserId};

use crate::StoreResult;
use crate::error::StoreError;

/// A company member with their account and profile.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub account: UserAccount,
    pub profile: UserProfile,
    pub membership: Membership,
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn company_by_id(&self, id: CompanyId) -> StoreResult<Option<Company>>;

    /// Lookup by slug regardless of the active flag.
    async fn company_by_slug(&self, slug: &str) -> StoreResult<Option<Company>>;

    /// Active companies ordered by name.
    async fn list_active_companies(&self, limit: usize) -> StoreResult<Vec<Company>>;

    async fn company_name_exists(&self, name: &str, exclude: Option<CompanyId>) -> StoreResult<bool>;

    /// Slugs equal to `base` or starting with `base-`.
    async fn slugs_like(&self, base: &str) -> StoreResult<Vec<String>>;

    /// Persist everything a registration created, all or nothing.
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()>;

    async fn update_company(&self, company: &Company) -> StoreResult<()>;

    async fn settings(&self, company_id: CompanyId) -> StoreResult<Option<CompanySettings>>;

    async fn save_settings(&self, settings: &CompanySettings) -> StoreResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<UserAccount>>;

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<UserAccount>>;

    /// Case-insensitive email lookup, optionally ignoring one user.
    async fn email_exists(&self, email: &str, exclude: Option<UserId>) -> StoreResult<bool>;

    async fn insert_user(&self, account: &UserAccount, profile: &UserProfile) -> StoreResult<()>;

    async fn update_user(&self, account: &UserAccount) -> StoreResult<()>;

    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>>;

    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()>;

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self.user_by_username(username).await?.is_some())
    }
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// The membership regardless of its active flag.
    async fn membership(&self, company_id: CompanyId, user_id: UserId) -> StoreResult<Option<Membership>>;

    async fn company_members(&self, company_id: CompanyId) -> StoreResult<Vec<MemberRecord>>;

    async fn count_active_members(&self, company_id: CompanyId) -> StoreResult<u64>;

    /// Insert a new membership; conflicts when the user already belongs.
    async fn insert_membership(&self, membership: &Membership) -> StoreResult<()>;

    /// Write back a changed membership if the stored version still matches.
    async fn save_membership(&self, membership: &Membership, expected: ExpectedVersion) -> StoreResult<()>;

    async fn delete_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        expected: ExpectedVersion,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait MenuStore: Send + Sync {
    /// Sections of one company ordered by `(order, title)`.
    async fn menu_sections(&self, company_id: CompanyId) -> StoreResult<Vec<MenuSection>>;

    async fn menu_section(&self, company_id: CompanyId, id: MenuSectionId) -> StoreResult<Option<MenuSection>>;

    async fn menu_title_exists(
        &self,
        company_id: CompanyId,
        title: &str,
        exclude: Option<MenuSectionId>,
    ) -> StoreResult<bool>;

    async fn insert_menu_section(&self, section: &MenuSection) -> StoreResult<()>;

    async fn update_menu_section(&self, section: &MenuSection) -> StoreResult<()>;

    async fn delete_menu_section(&self, company_id: CompanyId, id: MenuSectionId) -> StoreResult<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, token: &SessionToken) -> StoreResult<Option<Session>>;

    /// Insert or replace.
    async fn save_session(&self, session: &Session) -> StoreResult<()>;

    async fn delete_session(&self, token: &SessionToken) -> StoreResult<()>;

    /// Drop sessions that expired before `now`; returns how many.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store:
    CompanyStore + UserStore + MembershipStore + MenuStore + SessionStore + TenantDirectory<Error = StoreError>
{
}

impl<T> Store for T where
    T: CompanyStore
        + UserStore
        + MembershipStore
        + MenuStore
        + SessionStore
        + TenantDirectory<Error = StoreError>
{
}
