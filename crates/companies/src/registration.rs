//! Company registration factory.
//!
//! Everything a new tenant needs is built here in one step: optionally the
//! owner account with its profile, the company, its default settings and the
//! owner membership. The store persists the result atomically.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use bizdesk_auth::{NewAccount, Role, UserAccount, UserProfile};
use bizdesk_core::{Aggregate, DomainError, DomainResult, FieldErrors, UserId};

use crate::{
    Company, CompanyDetails, CompanySettings, CompanyType, CreateMembership, Membership,
    MembershipCommand, MembershipEvent,
};

/// Registration form: company details plus the owner's account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationInput {
    pub company_name: String,
    pub company_type: CompanyType,
    pub description: String,
    pub phone: String,
    pub company_email: String,
    pub address: String,
    pub city: String,
    pub tax_number: String,

    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegistrationInput {
    pub fn company_details(&self) -> CompanyDetails {
        CompanyDetails {
            name: self.company_name.clone(),
            company_type: self.company_type,
            description: self.description.clone(),
            phone: self.phone.clone(),
            email: self.company_email.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            tax_number: self.tax_number.clone(),
            ..Default::default()
        }
    }

    pub fn new_account(&self) -> NewAccount {
        NewAccount {
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            password_confirm: self.password_confirm.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            ..Default::default()
        }
    }

    /// Storage-free checks. Account fields are only checked when a new
    /// account will be created.
    pub fn collect_errors(&self, errors: &mut FieldErrors, creates_account: bool) {
        let details = self.company_details();
        details.collect_errors(errors, "company_name", "company_email");
        errors.require("company_email", &self.company_email);

        if creates_account {
            let account = self.new_account();
            account.collect_errors(errors);
            errors.require("first_name", &self.first_name);
            errors.require("last_name", &self.last_name);
        }
    }
}

/// The full set of records a registration creates.
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Option<(UserAccount, UserProfile)>,
    pub company: Company,
    pub settings: CompanySettings,
    pub owner: Membership,
    pub events: Vec<MembershipEvent>,
}

impl Registration {
    /// Build a registration.
    ///
    /// `existing_owner` is the signed-in user registering another company;
    /// when `None` a new account is built from the input. `slug` must already
    /// be unique.
    pub fn new(
        input: &RegistrationInput,
        existing_owner: Option<UserId>,
        slug: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut errors = FieldErrors::new();
        input.collect_errors(&mut errors, existing_owner.is_none());
        errors.into_result()?;

        let account = match existing_owner {
            Some(_) => None,
            None => Some(input.new_account().build(now)?),
        };
        let owner_id = match (&account, existing_owner) {
            (Some((account, _)), _) => account.id,
            (None, Some(id)) => id,
            (None, None) => return Err(DomainError::invariant("registration without an owner")),
        };

        let company = Company::new(&input.company_details(), slug, owner_id, now);
        let settings = CompanySettings::defaults(company.id, now);

        let mut owner = Membership::empty(company.id, owner_id);
        let events = owner.execute(&MembershipCommand::Create(CreateMembership {
            company_id: company.id,
            user_id: owner_id,
            role: Role::Owner,
            actor: None,
            occurred_at: now,
        }))?;

        Ok(Self { account, company, settings, owner, events })
    }

    pub fn owner_id(&self) -> UserId {
        self.owner.user_id()
    }
}
