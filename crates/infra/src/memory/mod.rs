//! In-memory store for tests and local development.
//!
//! One `RwLock` guards all state, so uniqueness checks and multi-record
//! writes (registration) are atomic with respect to each other.

mod tenant_map;

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bizdesk_auth::{Session, SessionToken, UserAccount, UserProfile};
use bizdesk_companies::{
    Company, CompanySettings, MenuSection, Membership, Registration, TenantDirectory,
};
use bizdesk_core::{CompanyId, ExpectedVersion, MenuSectionId, UserId, Versioned};

use crate::error::{StoreError, StoreResult};
use crate::store::{CompanyStore, MemberRecord, MembershipStore, MenuStore, SessionStore, UserStore};

pub use tenant_map::TenantMap;

#[derive(Debug, Default)]
struct State {
    companies: HashMap<CompanyId, Company>,
    settings: HashMap<CompanyId, CompanySettings>,
    users: HashMap<UserId, UserAccount>,
    profiles: HashMap<UserId, UserProfile>,
    memberships: TenantMap<UserId, Membership>,
    menu: TenantMap<MenuSectionId, MenuSection>,
    sessions: HashMap<String, Session>,
}

impl State {
    fn username_taken(&self, username: &str) -> bool {
        self.users.values().any(|u| u.username == username)
    }

    fn email_taken(&self, email: &str, exclude: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != exclude && u.email.eq_ignore_ascii_case(email))
    }

    fn company_name_taken(&self, name: &str, exclude: Option<CompanyId>) -> bool {
        self.companies.values().any(|c| Some(c.id) != exclude && c.name == name)
    }

    fn menu_title_taken(&self, company_id: CompanyId, title: &str, exclude: Option<MenuSectionId>) -> bool {
        self.menu
            .list(company_id)
            .any(|s| Some(s.id) != exclude && s.title == title)
    }

    fn check_new_user(&self, account: &UserAccount) -> StoreResult<()> {
        if self.users.contains_key(&account.id) || self.username_taken(&account.username) {
            return Err(StoreError::Conflict("username already exists".into()));
        }
        if self.email_taken(&account.email, None) {
            return Err(StoreError::Conflict("email already exists".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl CompanyStore for InMemoryStore {
    async fn company_by_id(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        Ok(self.read()?.companies.get(&id).cloned())
    }

    async fn company_by_slug(&self, slug: &str) -> StoreResult<Option<Company>> {
        Ok(self.read()?.companies.values().find(|c| c.slug == slug).cloned())
    }

    async fn list_active_companies(&self, limit: usize) -> StoreResult<Vec<Company>> {
        let state = self.read()?;
        let mut companies: Vec<Company> = state.companies.values().filter(|c| c.is_active).cloned().collect();
        companies.sort_by(|a, b| a.name.cmp(&b.name));
        companies.truncate(limit);
        Ok(companies)
    }

    async fn company_name_exists(&self, name: &str, exclude: Option<CompanyId>) -> StoreResult<bool> {
        Ok(self.read()?.company_name_taken(name, exclude))
    }

    async fn slugs_like(&self, base: &str) -> StoreResult<Vec<String>> {
        let prefix = format!("{base}-");
        Ok(self
            .read()?
            .companies
            .values()
            .filter(|c| c.slug == base || c.slug.starts_with(&prefix))
            .map(|c| c.slug.clone())
            .collect())
    }

    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        let mut state = self.write()?;
        let company = &registration.company;

        if let Some((account, _)) = &registration.account {
            state.check_new_user(account)?;
        } else if !state.users.contains_key(&registration.owner_id()) {
            return Err(StoreError::NotFound);
        }
        if state.company_name_taken(&company.name, None) {
            return Err(StoreError::Conflict("company name already exists".into()));
        }
        if state.companies.values().any(|c| c.slug == company.slug) {
            return Err(StoreError::Conflict("company slug already exists".into()));
        }

        if let Some((account, profile)) = &registration.account {
            state.users.insert(account.id, account.clone());
            state.profiles.insert(account.id, profile.clone());
        }
        state.companies.insert(company.id, company.clone());
        state.settings.insert(company.id, registration.settings.clone());
        state
            .memberships
            .put(registration.owner_id(), registration.owner.clone());
        Ok(())
    }

    async fn update_company(&self, company: &Company) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.companies.contains_key(&company.id) {
            return Err(StoreError::NotFound);
        }
        if state.company_name_taken(&company.name, Some(company.id)) {
            return Err(StoreError::Conflict("company name already exists".into()));
        }
        state.companies.insert(company.id, company.clone());
        Ok(())
    }

    async fn settings(&self, company_id: CompanyId) -> StoreResult<Option<CompanySettings>> {
        Ok(self.read()?.settings.get(&company_id).cloned())
    }

    async fn save_settings(&self, settings: &CompanySettings) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.companies.contains_key(&settings.company_id) {
            return Err(StoreError::NotFound);
        }
        state.settings.insert(settings.company_id, settings.clone());
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<UserAccount>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<UserAccount>> {
        Ok(self.read()?.users.values().find(|u| u.username == username).cloned())
    }

    async fn email_exists(&self, email: &str, exclude: Option<UserId>) -> StoreResult<bool> {
        Ok(self.read()?.email_taken(email, exclude))
    }

    async fn insert_user(&self, account: &UserAccount, profile: &UserProfile) -> StoreResult<()> {
        let mut state = self.write()?;
        state.check_new_user(account)?;
        state.users.insert(account.id, account.clone());
        state.profiles.insert(account.id, profile.clone());
        Ok(())
    }

    async fn update_user(&self, account: &UserAccount) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.users.contains_key(&account.id) {
            return Err(StoreError::NotFound);
        }
        if state.email_taken(&account.email, Some(account.id)) {
            return Err(StoreError::Conflict("email already exists".into()));
        }
        state.users.insert(account.id, account.clone());
        Ok(())
    }

    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>> {
        Ok(self.read()?.profiles.get(&user_id).cloned())
    }

    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.users.contains_key(&profile.user_id) {
            return Err(StoreError::NotFound);
        }
        state.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn membership(&self, company_id: CompanyId, user_id: UserId) -> StoreResult<Option<Membership>> {
        Ok(self.read()?.memberships.get(company_id, &user_id).cloned())
    }

    async fn company_members(&self, company_id: CompanyId) -> StoreResult<Vec<MemberRecord>> {
        let state = self.read()?;
        let members = state
            .memberships
            .list(company_id)
            .filter_map(|m| {
                let account = state.users.get(&m.user_id())?.clone();
                let profile = state
                    .profiles
                    .get(&m.user_id())
                    .cloned()
                    .unwrap_or_else(|| UserProfile::empty(m.user_id()));
                Some(MemberRecord { account, profile, membership: m.clone() })
            })
            .collect();
        Ok(members)
    }

    async fn count_active_members(&self, company_id: CompanyId) -> StoreResult<u64> {
        Ok(self.read()?.memberships.list(company_id).filter(|m| m.is_active()).count() as u64)
    }

    async fn insert_membership(&self, membership: &Membership) -> StoreResult<()> {
        let mut state = self.write()?;
        let (company_id, user_id) = (membership.company_id(), membership.user_id());
        if !state.companies.contains_key(&company_id) || !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        if state.memberships.contains(company_id, &user_id) {
            return Err(StoreError::Conflict("user is already a member of this company".into()));
        }
        state.memberships.put(user_id, membership.clone());
        Ok(())
    }

    async fn save_membership(&self, membership: &Membership, expected: ExpectedVersion) -> StoreResult<()> {
        let mut state = self.write()?;
        let (company_id, user_id) = (membership.company_id(), membership.user_id());
        let stored = state.memberships.get(company_id, &user_id).ok_or(StoreError::NotFound)?;
        expected.check(stored.version())?;
        state.memberships.put(user_id, membership.clone());
        Ok(())
    }

    async fn delete_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        expected: ExpectedVersion,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let stored = state.memberships.get(company_id, &user_id).ok_or(StoreError::NotFound)?;
        expected.check(stored.version())?;
        state.memberships.remove(company_id, &user_id);
        Ok(())
    }
}

#[async_trait]
impl MenuStore for InMemoryStore {
    async fn menu_sections(&self, company_id: CompanyId) -> StoreResult<Vec<MenuSection>> {
        let mut sections: Vec<MenuSection> = self.read()?.menu.list(company_id).cloned().collect();
        MenuSection::sort(&mut sections);
        Ok(sections)
    }

    async fn menu_section(&self, company_id: CompanyId, id: MenuSectionId) -> StoreResult<Option<MenuSection>> {
        Ok(self.read()?.menu.get(company_id, &id).cloned())
    }

    async fn menu_title_exists(
        &self,
        company_id: CompanyId,
        title: &str,
        exclude: Option<MenuSectionId>,
    ) -> StoreResult<bool> {
        Ok(self.read()?.menu_title_taken(company_id, title, exclude))
    }

    async fn insert_menu_section(&self, section: &MenuSection) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.menu_title_taken(section.company_id, &section.title, None) {
            return Err(StoreError::Conflict("menu section title already exists".into()));
        }
        state.menu.put(section.id, section.clone());
        Ok(())
    }

    async fn update_menu_section(&self, section: &MenuSection) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.menu.contains(section.company_id, &section.id) {
            return Err(StoreError::NotFound);
        }
        if state.menu_title_taken(section.company_id, &section.title, Some(section.id)) {
            return Err(StoreError::Conflict("menu section title already exists".into()));
        }
        state.menu.put(section.id, section.clone());
        Ok(())
    }

    async fn delete_menu_section(&self, company_id: CompanyId, id: MenuSectionId) -> StoreResult<()> {
        self.write()?
            .menu
            .remove(company_id, &id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn load_session(&self, token: &SessionToken) -> StoreResult<Option<Session>> {
        Ok(self.read()?.sessions.get(token.as_str()).cloned())
    }

    async fn save_session(&self, session: &Session) -> StoreResult<()> {
        self.write()?
            .sessions
            .insert(session.token.as_str().to_string(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, token: &SessionToken) -> StoreResult<()> {
        self.write()?.sessions.remove(token.as_str());
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.write()?;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl TenantDirectory for InMemoryStore {
    type Error = StoreError;

    async fn active_company_by_slug(&self, slug: &str) -> StoreResult<Option<Company>> {
        Ok(self
            .read()?
            .companies
            .values()
            .find(|c| c.slug == slug && c.is_active)
            .cloned())
    }

    async fn active_membership(&self, company_id: CompanyId, user_id: UserId) -> StoreResult<Option<Membership>> {
        Ok(self
            .read()?
            .memberships
            .get(company_id, &user_id)
            .filter(|m| m.is_active())
            .cloned())
    }

    async fn active_memberships_for_user(&self, user_id: UserId) -> StoreResult<Vec<(Company, Membership)>> {
        let state = self.read()?;
        let mut found: Vec<(Company, Membership)> = state
            .memberships
            .values()
            .filter(|m| m.user_id() == user_id && m.is_active())
            .filter_map(|m| {
                let company = state.companies.get(&m.company_id()).filter(|c| c.is_active)?;
                Some((company.clone(), m.clone()))
            })
            .collect();
        found.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        Ok(found)
    }
}

#[cfg(test)]
mod tests;
