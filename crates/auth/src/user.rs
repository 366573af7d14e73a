//! User accounts and profiles.
//!
//! Accounts are global (one login across companies); what a user may do in
//! a company is decided by their membership there, never by the account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bizdesk_core::{DomainError, DomainResult, Entity, FieldErrors, UserId};

use crate::hash_password;

pub const USERNAME_MAX_LEN: usize = 150;
pub const NAME_MAX_LEN: usize = 30;
pub const MIN_PASSWORD_LEN: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// "First Last", or the username when both names are blank.
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    pub fn check_password(&self, plain: &str) -> bool {
        self.is_active && crate::verify_password(plain, &self.password_hash)
    }

    pub fn set_password(&mut self, plain: &str) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        check_password_strength(&mut errors, "password", plain);
        errors.into_result()?;
        self.password_hash = hash_password(plain).map_err(|e| DomainError::invariant(e.to_string()))?;
        Ok(())
    }

    pub fn apply_changes(&mut self, changes: &AccountChanges) -> DomainResult<()> {
        changes.validate()?;
        if let Some(email) = &changes.email {
            self.email = email.trim().to_string();
        }
        if let Some(first_name) = &changes.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &changes.last_name {
            self.last_name = last_name.trim().to_string();
        }
        Ok(())
    }
}

impl Entity for UserAccount {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn check_password_strength(errors: &mut FieldErrors, field: &str, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        );
    } else if password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, "This password is entirely numeric.");
    }
}

/// Usernames: letters, digits and `@.+-_`.
fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Contact details kept next to the account; created together with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub phone: String,
    pub position: String,
    pub department: String,
    pub email: String,
}

impl UserProfile {
    pub fn empty(user_id: UserId) -> Self {
        Self { user_id, ..Default::default() }
    }

    pub fn apply_changes(&mut self, changes: &ProfileChanges) -> DomainResult<()> {
        changes.validate()?;
        if let Some(phone) = &changes.phone {
            self.phone = phone.trim().to_string();
        }
        if let Some(position) = &changes.position {
            self.position = position.trim().to_string();
        }
        if let Some(department) = &changes.department {
            self.department = department.trim().to_string();
        }
        if let Some(email) = &changes.email {
            self.email = email.trim().to_string();
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Input for creating an account (registration or invitation).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub position: String,
    pub department: String,
}

impl NewAccount {
    /// Field checks that need no storage. Uniqueness is checked by the store.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        self.collect_errors(&mut errors);
        errors.into_result()
    }

    pub fn collect_errors(&self, errors: &mut FieldErrors) {
        let username = self.username.trim();
        errors.require("username", username);
        errors.max_len("username", username, USERNAME_MAX_LEN);
        if !username.is_empty() && !is_valid_username(username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        errors.require("email", &self.email);
        errors.email("email", self.email.trim());
        errors.max_len("first_name", self.first_name.trim(), NAME_MAX_LEN);
        errors.max_len("last_name", self.last_name.trim(), NAME_MAX_LEN);

        errors.require("password", &self.password);
        if !self.password.is_empty() {
            check_password_strength(errors, "password", &self.password);
        }
        if self.password != self.password_confirm {
            errors.add("password_confirm", "The two password fields didn't match.");
        }
    }

    /// Validate, hash the password and build the account with its profile.
    pub fn build(&self, now: DateTime<Utc>) -> DomainResult<(UserAccount, UserProfile)> {
        self.validate()?;
        let password_hash =
            hash_password(&self.password).map_err(|e| DomainError::invariant(e.to_string()))?;

        let account = UserAccount {
            id: UserId::new(),
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password_hash,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            is_active: true,
            is_staff: false,
            date_joined: now,
            last_login: None,
        };
        let profile = UserProfile {
            user_id: account.id,
            phone: self.phone.trim().to_string(),
            position: self.position.trim().to_string(),
            department: self.department.trim().to_string(),
            email: String::new(),
        };
        Ok((account, profile))
    }
}

/// Partial account update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AccountChanges {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(email) = &self.email {
            errors.require("email", email);
            errors.email("email", email.trim());
        }
        if let Some(first_name) = &self.first_name {
            errors.max_len("first_name", first_name.trim(), NAME_MAX_LEN);
        }
        if let Some(last_name) = &self.last_name {
            errors.max_len("last_name", last_name.trim(), NAME_MAX_LEN);
        }
        errors.into_result()
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.first_name.is_none() && self.last_name.is_none()
    }
}

/// Partial profile update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileChanges {
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
}

impl ProfileChanges {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(phone) = &self.phone {
            errors.max_len("phone", phone.trim(), 20);
        }
        if let Some(position) = &self.position {
            errors.max_len("position", position.trim(), 100);
        }
        if let Some(department) = &self.department {
            errors.max_len("department", department.trim(), 100);
        }
        if let Some(email) = &self.email {
            errors.email("email", email.trim());
        }
        errors.into_result()
    }
}
