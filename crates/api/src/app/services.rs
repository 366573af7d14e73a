//! Application services shared by the page and REST handlers.
//!
//! Each operation validates input, checks the rules that need stored data
//! and writes through the [`Store`]. Authorization guards run here so both
//! surfaces enforce the same policy.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};

use bizdesk_auth::{UserAccount, UserProfile, generate_temporary_password};
use bizdesk_companies::{
    ChangeRole, Company, CompanySettings, CreateMembership, Membership, MembershipCommand, MembershipEvent,
    MenuSection, MenuSectionInput, NO_ACCESS_MESSAGE, Registration, RegistrationInput, RemoveMembership,
    SectionType, SetActive, TenantResolver, slugify, unique_slug,
};
use bizdesk_core::{Aggregate, CompanyId, ExpectedVersion, FieldErrors, MenuSectionId, UserId, Versioned};
use bizdesk_infra::{MemberRecord, Store};

use crate::app::dto::{InviteRequest, MemberUpdateRequest, SettingsUpdateRequest, UserListQuery};
use crate::app::errors::ApiError;
use crate::authz;
use crate::config::Config;
use crate::context::TenantContext;

pub const SELECTION_LIMIT: usize = 10;
pub const INVALID_CREDENTIALS: &str = "Invalid username or password.";
pub const SECTION_DENIED: &str = "You do not have access to this section.";
const COMPANY_NAME_TAKEN: &str = "A company with this name already exists.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "A user with this email already exists.";
const ALREADY_MEMBER: &str = "User is already a member of this company.";
const MENU_TITLE_TAKEN: &str = "A section with this title already exists.";

pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub resolver: TenantResolver,
}

pub fn build_services(config: Config, store: Arc<dyn Store>) -> AppServices {
    AppServices {
        store,
        config,
        resolver: TenantResolver::new().with_exempt_prefix("/logout/"),
    }
}

/// Result of adding a user to a company.
#[derive(Debug, Clone)]
pub struct Invitation {
    pub record: MemberRecord,
    /// Set when the account was created with a generated password.
    pub temporary_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub account: UserAccount,
    pub active_members: u64,
    pub menu: Vec<MenuSection>,
}

fn log_events(events: &[MembershipEvent]) {
    events.iter().for_each(MembershipEvent::log);
}

impl AppServices {
    // ─────────────────────────────────────────────────────────────────────
    // Companies and sign-in
    // ─────────────────────────────────────────────────────────────────────

    pub async fn selectable_companies(&self) -> Result<Vec<Company>, ApiError> {
        Ok(self.store.list_active_companies(SELECTION_LIMIT).await?)
    }

    pub async fn active_company(&self, slug: &str) -> Result<Option<Company>, ApiError> {
        Ok(self.store.active_company_by_slug(slug.trim()).await?)
    }

    /// Register a company and its owner.
    ///
    /// `existing_owner` is the signed-in user; otherwise an account is
    /// created from the input.
    pub async fn register_company(
        &self,
        input: &RegistrationInput,
        existing_owner: Option<UserId>,
    ) -> Result<Registration, ApiError> {
        let mut errors = FieldErrors::new();
        input.collect_errors(&mut errors, existing_owner.is_none());

        let name = input.company_name.trim();
        if !name.is_empty() && self.store.company_name_exists(name, None).await? {
            errors.add("company_name", COMPANY_NAME_TAKEN);
        }
        if existing_owner.is_none() {
            let username = input.username.trim();
            if !username.is_empty() && self.store.username_exists(username).await? {
                errors.add("username", USERNAME_TAKEN);
            }
            let email = input.email.trim();
            if !email.is_empty() && self.store.email_exists(email, None).await? {
                errors.add("email", EMAIL_TAKEN);
            }
        }
        errors.into_result()?;

        let base = slugify(name);
        let taken: HashSet<String> = self.store.slugs_like(&base).await?.into_iter().collect();
        let slug = unique_slug(&base, |candidate| taken.contains(candidate));

        let registration = Registration::new(input, existing_owner, slug, Utc::now())?;
        self.store.insert_registration(&registration).await?;

        log_events(&registration.events);
        tracing::info!(
            company = %registration.company.slug,
            owner_id = %registration.owner_id(),
            new_account = registration.account.is_some(),
            "company registered"
        );
        Ok(registration)
    }

    /// Check credentials and stamp the login time.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<UserAccount>, ApiError> {
        let Some(mut account) = self.store.user_by_username(username.trim()).await? else {
            return Ok(None);
        };
        if !account.check_password(password) {
            tracing::info!(username = %account.username, "login failed");
            return Ok(None);
        }
        account.last_login = Some(Utc::now());
        self.store.update_user(&account).await?;
        Ok(Some(account))
    }

    /// Page login into one company: valid credentials and an active membership.
    pub async fn company_login(
        &self,
        company: &Company,
        username: &str,
        password: &str,
    ) -> Result<UserAccount, ApiError> {
        let Some(account) = self.authenticate(username, password).await? else {
            return Err(ApiError::non_field(INVALID_CREDENTIALS));
        };
        if self.store.active_membership(company.id, account.id).await?.is_none() {
            tracing::info!(user_id = %account.id, company = %company.slug, "login denied: no active membership");
            return Err(ApiError::non_field(NO_ACCESS_MESSAGE));
        }
        tracing::info!(user_id = %account.id, company = %company.slug, "user logged in");
        Ok(account)
    }

    /// API login. Without a slug the only active company is picked, if any.
    pub async fn api_login(
        &self,
        username: &str,
        password: &str,
        company_slug: Option<&str>,
    ) -> Result<(UserAccount, Option<Company>), ApiError> {
        let Some(account) = self.authenticate(username, password).await? else {
            return Err(ApiError::InvalidCredentials);
        };

        let company = match company_slug.map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => {
                let Some(company) = self.active_company(slug).await? else {
                    let mut errors = FieldErrors::new();
                    errors.add("company_slug", "Company not found or inactive.");
                    return Err(errors.into());
                };
                if self.store.active_membership(company.id, account.id).await?.is_none() {
                    return Err(ApiError::forbidden(NO_ACCESS_MESSAGE));
                }
                Some(company)
            }
            None => {
                let mut memberships = self.store.active_memberships_for_user(account.id).await?;
                if memberships.len() == 1 { Some(memberships.remove(0).0) } else { None }
            }
        };

        tracing::info!(user_id = %account.id, company = ?company.as_ref().map(|c| &c.slug), "api login");
        Ok((account, company))
    }

    pub async fn dashboard(&self, tenant: &TenantContext) -> Result<Dashboard, ApiError> {
        let account = self.store.user_by_id(tenant.user_id()).await?.ok_or(ApiError::NotFound)?;
        let active_members = self.store.count_active_members(tenant.company_id()).await?;
        let role = tenant.membership().role();
        let menu = self
            .store
            .menu_sections(tenant.company_id())
            .await?
            .into_iter()
            .filter(|section| section.is_visible_to(role))
            .collect();
        Ok(Dashboard { account, active_members, menu })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────────────

    pub async fn settings(&self, tenant: &TenantContext) -> Result<CompanySettings, ApiError> {
        authz::require_admin(tenant, authz::SETTINGS_VIEW_DENIED)?;
        let settings = self.store.settings(tenant.company_id()).await?;
        Ok(settings.unwrap_or_else(|| CompanySettings::defaults(tenant.company_id(), Utc::now())))
    }

    pub async fn update_settings(
        &self,
        tenant: &TenantContext,
        request: &SettingsUpdateRequest,
    ) -> Result<(Company, CompanySettings), ApiError> {
        authz::require_settings_owner(tenant)?;
        let company_id = tenant.company_id();
        let now = Utc::now();

        let mut errors = FieldErrors::new();
        if let Some(details) = &request.company {
            details.collect_errors(&mut errors, "name", "email");
            let name = details.name.trim();
            if !name.is_empty() && self.store.company_name_exists(name, Some(company_id)).await? {
                errors.add("name", COMPANY_NAME_TAKEN);
            }
        }
        request.settings.collect_errors(&mut errors);
        errors.into_result()?;

        let mut company = self.store.company_by_id(company_id).await?.ok_or(ApiError::NotFound)?;
        if let Some(details) = &request.company {
            company.apply_details(details, now);
            self.store.update_company(&company).await?;
        }

        let mut settings = self
            .store
            .settings(company_id)
            .await?
            .unwrap_or_else(|| CompanySettings::defaults(company_id, now));
        settings.apply_changes(&request.settings, now)?;
        self.store.save_settings(&settings).await?;

        tracing::info!(company = %company.slug, user_id = %tenant.user_id(), "company settings updated");
        Ok((company, settings))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Members
    // ─────────────────────────────────────────────────────────────────────

    async fn load_membership(&self, company_id: CompanyId, user_id: UserId) -> Result<Membership, ApiError> {
        self.store.membership(company_id, user_id).await?.ok_or(ApiError::NotFound)
    }

    async fn member_record(&self, membership: Membership) -> Result<MemberRecord, ApiError> {
        let user_id = membership.user_id();
        let account = self.store.user_by_id(user_id).await?.ok_or(ApiError::NotFound)?;
        let profile = self.store.profile(user_id).await?.unwrap_or_else(|| UserProfile::empty(user_id));
        Ok(MemberRecord { account, profile, membership })
    }

    /// Members that manage users see everyone; others only themselves.
    pub async fn visible_members(
        &self,
        tenant: &TenantContext,
        query: &UserListQuery,
    ) -> Result<Vec<MemberRecord>, ApiError> {
        let records = if tenant.grant().capabilities.can_manage_users {
            self.store.company_members(tenant.company_id()).await?
        } else {
            vec![self.member_record(tenant.membership().clone()).await?]
        };
        Ok(query.apply(records))
    }

    pub async fn member(&self, tenant: &TenantContext, user_id: UserId) -> Result<MemberRecord, ApiError> {
        if user_id != tenant.user_id() && !tenant.grant().capabilities.can_manage_users {
            return Err(ApiError::NotFound);
        }
        let membership = self.load_membership(tenant.company_id(), user_id).await?;
        self.member_record(membership).await
    }

    fn new_membership(
        tenant: &TenantContext,
        user_id: UserId,
        request: &InviteRequest,
        now: DateTime<Utc>,
    ) -> Result<(Membership, Vec<MembershipEvent>), ApiError> {
        let mut membership = Membership::empty(tenant.company_id(), user_id);
        let events = membership.execute(&MembershipCommand::Create(CreateMembership {
            company_id: tenant.company_id(),
            user_id,
            role: request.role(),
            actor: Some(tenant.actor()),
            occurred_at: now,
        }))?;
        Ok((membership, events))
    }

    pub async fn invite_member(&self, tenant: &TenantContext, request: &InviteRequest) -> Result<Invitation, ApiError> {
        authz::require_invite(tenant)?;
        let role = request.role();
        if !tenant.membership().role().can_assign(role) {
            let mut errors = FieldErrors::new();
            errors.add("role", format!("You cannot assign the role {}.", role.label()));
            return Err(errors.into());
        }
        let now = Utc::now();

        let username = request.username.trim();
        let existing = if username.is_empty() { None } else { self.store.user_by_username(username).await? };

        if let Some(account) = existing {
            if self.store.membership(tenant.company_id(), account.id).await?.is_some() {
                let mut errors = FieldErrors::new();
                errors.add("username", ALREADY_MEMBER);
                return Err(errors.into());
            }
            let (membership, events) = Self::new_membership(tenant, account.id, request, now)?;
            self.store.insert_membership(&membership).await?;
            log_events(&events);
            tracing::info!(user_id = %account.id, company = %tenant.slug(), "existing user added to company");
            let record = self.member_record(membership).await?;
            return Ok(Invitation { record, temporary_password: None });
        }

        let temporary_password = request.password.is_empty().then(generate_temporary_password);
        let password = temporary_password.as_deref().unwrap_or(&request.password);
        let new_account = request.new_account(password, temporary_password.is_some());

        let mut errors = FieldErrors::new();
        new_account.collect_errors(&mut errors);
        let email = request.email.trim();
        if !email.is_empty() && self.store.email_exists(email, None).await? {
            errors.add("email", EMAIL_TAKEN);
        }
        errors.into_result()?;

        let (account, profile) = new_account.build(now)?;
        let (membership, events) = Self::new_membership(tenant, account.id, request, now)?;
        self.store.insert_user(&account, &profile).await?;
        self.store.insert_membership(&membership).await?;

        log_events(&events);
        tracing::info!(user_id = %account.id, company = %tenant.slug(), "user invited");
        Ok(Invitation { record: MemberRecord { account, profile, membership }, temporary_password })
    }

    /// Edit a member's role, active flag, account and profile.
    ///
    /// Editing oneself is always allowed for account and profile fields;
    /// editing others needs admin rights over the member's role.
    pub async fn update_member(
        &self,
        tenant: &TenantContext,
        user_id: UserId,
        request: &MemberUpdateRequest,
    ) -> Result<MemberRecord, ApiError> {
        let editing_self = user_id == tenant.user_id();
        if !editing_self {
            authz::require_user_admin(tenant)?;
        }
        let mut membership = self.load_membership(tenant.company_id(), user_id).await?;
        if !editing_self && !tenant.membership().role().can_manage(membership.role()) {
            return Err(ApiError::forbidden(format!(
                "You cannot edit a member with the role {}.",
                membership.role().label()
            )));
        }

        let account_changes = request.profile.account_changes();
        let profile_changes = request.profile.profile_changes();
        let mut errors = FieldErrors::new();
        if let Err(found) = account_changes.validate() {
            errors.merge(found);
        }
        if let Err(found) = profile_changes.validate() {
            errors.merge(found);
        }
        if let Some(email) = account_changes.email.as_deref().map(str::trim) {
            if !email.is_empty() && self.store.email_exists(email, Some(user_id)).await? {
                errors.add("email", EMAIL_TAKEN);
            }
        }
        errors.into_result()?;

        let expected = ExpectedVersion::Exact(membership.version());
        let actor = tenant.actor();
        let now = Utc::now();
        let mut events = Vec::new();
        if let Some(role) = request.role.filter(|role| *role != membership.role()) {
            events.extend(membership.execute(&MembershipCommand::ChangeRole(ChangeRole {
                actor,
                role,
                occurred_at: now,
            }))?);
        }
        if let Some(active) = request.is_active.filter(|active| *active != membership.is_active()) {
            events.extend(membership.execute(&MembershipCommand::SetActive(SetActive {
                actor,
                active,
                occurred_at: now,
            }))?);
        }

        let mut account = self.store.user_by_id(user_id).await?.ok_or(ApiError::NotFound)?;
        account.apply_changes(&account_changes)?;
        let mut profile = self.store.profile(user_id).await?.unwrap_or_else(|| UserProfile::empty(user_id));
        profile.apply_changes(&profile_changes)?;

        if !events.is_empty() {
            self.store.save_membership(&membership, expected).await?;
            log_events(&events);
        }
        if !account_changes.is_empty() {
            self.store.update_user(&account).await?;
        }
        self.store.save_profile(&profile).await?;

        tracing::info!(user_id = %user_id, company = %tenant.slug(), editor = %tenant.user_id(), "member updated");
        Ok(MemberRecord { account, profile, membership })
    }

    pub async fn set_member_active(
        &self,
        tenant: &TenantContext,
        user_id: UserId,
        active: bool,
    ) -> Result<MemberRecord, ApiError> {
        authz::require_user_admin(tenant)?;
        let mut membership = self.load_membership(tenant.company_id(), user_id).await?;
        let expected = ExpectedVersion::Exact(membership.version());
        let events = membership.execute(&MembershipCommand::SetActive(SetActive {
            actor: tenant.actor(),
            active,
            occurred_at: Utc::now(),
        }))?;
        if !events.is_empty() {
            self.store.save_membership(&membership, expected).await?;
            log_events(&events);
        }
        self.member_record(membership).await
    }

    /// Remove the membership; the account itself stays.
    pub async fn remove_member(&self, tenant: &TenantContext, user_id: UserId) -> Result<UserAccount, ApiError> {
        authz::require_user_admin(tenant)?;
        let mut membership = self.load_membership(tenant.company_id(), user_id).await?;
        let expected = ExpectedVersion::Exact(membership.version());
        let events = membership.execute(&MembershipCommand::Remove(RemoveMembership {
            actor: tenant.actor(),
            occurred_at: Utc::now(),
        }))?;
        let account = self.store.user_by_id(user_id).await?.ok_or(ApiError::NotFound)?;
        self.store.delete_membership(tenant.company_id(), user_id, expected).await?;
        log_events(&events);
        Ok(account)
    }

    /// Set a generated password and return it.
    pub async fn reset_password(&self, tenant: &TenantContext, user_id: UserId) -> Result<String, ApiError> {
        authz::require_user_admin(tenant)?;
        let membership = self.load_membership(tenant.company_id(), user_id).await?;
        if user_id != tenant.user_id() && !tenant.membership().role().can_manage(membership.role()) {
            return Err(ApiError::forbidden(format!(
                "You cannot reset the password of a member with the role {}.",
                membership.role().label()
            )));
        }

        let mut account = self.store.user_by_id(user_id).await?.ok_or(ApiError::NotFound)?;
        let password = generate_temporary_password();
        account.set_password(&password)?;
        self.store.update_user(&account).await?;

        tracing::info!(user_id = %user_id, company = %tenant.slug(), editor = %tenant.user_id(), "password reset");
        Ok(password)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Menu
    // ─────────────────────────────────────────────────────────────────────

    pub async fn menu_sections(&self, tenant: &TenantContext) -> Result<Vec<MenuSection>, ApiError> {
        authz::require_menu_admin(tenant)?;
        Ok(self.store.menu_sections(tenant.company_id()).await?)
    }

    async fn check_menu_input(
        &self,
        company_id: CompanyId,
        input: &MenuSectionInput,
        exclude: Option<MenuSectionId>,
    ) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Err(found) = input.validate() {
            errors.merge(found);
        }
        let title = input.title.trim();
        if !title.is_empty() && self.store.menu_title_exists(company_id, title, exclude).await? {
            errors.add("title", MENU_TITLE_TAKEN);
        }
        Ok(errors.into_result()?)
    }

    pub async fn create_menu_section(
        &self,
        tenant: &TenantContext,
        input: &MenuSectionInput,
    ) -> Result<MenuSection, ApiError> {
        authz::require_menu_admin(tenant)?;
        self.check_menu_input(tenant.company_id(), input, None).await?;

        let section = MenuSection::create(input, tenant.company_id(), tenant.user_id(), Utc::now());
        self.store.insert_menu_section(&section).await?;
        tracing::info!(company = %tenant.slug(), section_id = %section.id, title = %section.title, "menu section created");
        Ok(section)
    }

    pub async fn update_menu_section(
        &self,
        tenant: &TenantContext,
        id: MenuSectionId,
        input: &MenuSectionInput,
    ) -> Result<MenuSection, ApiError> {
        authz::require_menu_admin(tenant)?;
        let mut section = self.store.menu_section(tenant.company_id(), id).await?.ok_or(ApiError::NotFound)?;
        self.check_menu_input(tenant.company_id(), input, Some(id)).await?;

        section.apply(input, Utc::now());
        self.store.update_menu_section(&section).await?;
        tracing::info!(company = %tenant.slug(), section_id = %section.id, "menu section updated");
        Ok(section)
    }

    pub async fn delete_menu_section(&self, tenant: &TenantContext, id: MenuSectionId) -> Result<MenuSection, ApiError> {
        authz::require_menu_admin(tenant)?;
        let section = self.store.menu_section(tenant.company_id(), id).await?.ok_or(ApiError::NotFound)?;
        self.store.delete_menu_section(tenant.company_id(), id).await?;
        tracing::info!(company = %tenant.slug(), section_id = %id, "menu section deleted");
        Ok(section)
    }

    /// An iframe section the member may open.
    pub async fn iframe_section(&self, tenant: &TenantContext, id: MenuSectionId) -> Result<MenuSection, ApiError> {
        let section = self.store.menu_section(tenant.company_id(), id).await?.ok_or(ApiError::NotFound)?;
        if section.section_type != SectionType::Iframe {
            return Err(ApiError::NotFound);
        }
        if !section.is_active || !section.can_access(&tenant.grant()) {
            tracing::info!(user_id = %tenant.user_id(), section_id = %id, "section access denied");
            return Err(ApiError::forbidden(SECTION_DENIED));
        }
        Ok(section)
    }
}
