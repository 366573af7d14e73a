use serde::Deserialize;
use serde_json::{Value, json};

use bizdesk_auth::{AccountChanges, FlashMessage, NewAccount, ProfileChanges, Role, UserAccount, UserProfile};
use bizdesk_companies::{Company, CompanyDetails, CompanySettings, Membership, MenuSection, SettingsChanges};
use bizdesk_infra::MemberRecord;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectCompanyRequest {
    pub company_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiLoginRequest {
    pub username: String,
    pub password: String,
    pub company_slug: Option<String>,
}

/// Add a user to the company. An existing username is attached as is;
/// otherwise an account is created, with a temporary password when none
/// is given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InviteRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
    pub phone: String,
    pub position: String,
    pub department: String,
    pub role: Option<Role>,
}

impl InviteRequest {
    pub fn role(&self) -> Role {
        self.role.unwrap_or_default()
    }

    /// `generated` passwords are confirmed automatically.
    pub fn new_account(&self, password: &str, generated: bool) -> NewAccount {
        NewAccount {
            username: self.username.clone(),
            email: self.email.clone(),
            password: password.to_string(),
            password_confirm: if generated { password.to_string() } else { self.password_confirm.clone() },
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            position: self.position.clone(),
            department: self.department.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdateRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    /// Secondary address kept on the profile.
    pub profile_email: Option<String>,
}

impl ProfileUpdateRequest {
    pub fn account_changes(&self) -> AccountChanges {
        AccountChanges {
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    pub fn profile_changes(&self) -> ProfileChanges {
        ProfileChanges {
            phone: self.phone.clone(),
            position: self.position.clone(),
            department: self.department.clone(),
            email: self.profile_email.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemberUpdateRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub profile: ProfileUpdateRequest,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsUpdateRequest {
    pub company: Option<CompanyDetails>,
    pub settings: SettingsChanges,
}

/// Filters of the user list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserListQuery {
    pub is_active: Option<bool>,
    pub q: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub ordering: Option<String>,
}

const DEFAULT_ORDERING: &str = "-date_joined";
const ORDERING_FIELDS: &[&str] = &["username", "first_name", "last_name", "date_joined"];

impl UserListQuery {
    pub fn apply(&self, mut records: Vec<MemberRecord>) -> Vec<MemberRecord> {
        records.retain(|record| self.matches(record));

        let ordering = self
            .ordering
            .as_deref()
            .map(str::trim)
            .filter(|o| ORDERING_FIELDS.contains(&o.trim_start_matches('-')))
            .unwrap_or(DEFAULT_ORDERING);
        let descending = ordering.starts_with('-');
        let field = ordering.trim_start_matches('-');

        records.sort_by(|a, b| {
            let (a, b) = (&a.account, &b.account);
            let order = match field {
                "first_name" => a.first_name.cmp(&b.first_name),
                "last_name" => a.last_name.cmp(&b.last_name),
                "date_joined" => a.date_joined.cmp(&b.date_joined),
                _ => a.username.cmp(&b.username),
            };
            if descending { order.reverse() } else { order }
        });
        records
    }

    fn matches(&self, record: &MemberRecord) -> bool {
        if let Some(active) = self.is_active {
            if record.membership.is_active() != active {
                return false;
            }
        }
        if let Some(q) = non_blank(&self.q) {
            let account = &record.account;
            let hit = [&account.username, &account.email, &account.first_name, &account.last_name]
                .into_iter()
                .any(|value| contains_ci(value, q));
            if !hit {
                return false;
            }
        }
        if let Some(department) = non_blank(&self.department) {
            if !contains_ci(&record.profile.department, department) {
                return false;
            }
        }
        if let Some(position) = non_blank(&self.position) {
            if !contains_ci(&record.profile.position, position) {
                return false;
            }
        }
        true
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// -------------------------
// Response mapping
// -------------------------

pub fn company_to_json(company: &Company) -> Value {
    json!({
        "id": company.id.to_string(),
        "name": company.name,
        "slug": company.slug,
        "company_type": company.company_type,
        "company_type_label": company.company_type.label(),
        "description": company.description,
        "phone": company.phone,
        "email": company.email,
        "website": company.website,
        "address": company.address,
        "city": company.city,
        "country": company.country,
        "tax_number": company.tax_number,
        "registration_number": company.registration_number,
        "is_active": company.is_active,
        "owner_id": company.owner_id.to_string(),
        "dashboard_url": company.dashboard_path(),
        "login_url": company.login_path(),
        "created_at": company.created_at.to_rfc3339(),
    })
}

/// Public subset shown on the selection and login pages.
pub fn company_summary_to_json(company: &Company) -> Value {
    json!({
        "name": company.name,
        "slug": company.slug,
        "company_type": company.company_type,
        "city": company.city,
        "login_url": company.login_path(),
    })
}

pub fn settings_to_json(settings: &CompanySettings) -> Value {
    json!({
        "theme_color": settings.theme_color,
        "allow_user_registration": settings.allow_user_registration,
        "require_email_verification": settings.require_email_verification,
        "default_currency": settings.default_currency,
        "order_approval_required": settings.order_approval_required,
        "updated_at": settings.updated_at.to_rfc3339(),
    })
}

pub fn membership_to_json(membership: &Membership) -> Value {
    json!({
        "role": membership.role(),
        "role_label": membership.role().label(),
        "capabilities": membership.capabilities(),
        "is_active": membership.is_active(),
        "joined_at": membership.joined_at().to_rfc3339(),
    })
}

pub fn account_to_json(account: &UserAccount) -> Value {
    json!({
        "id": account.id.to_string(),
        "username": account.username,
        "email": account.email,
        "first_name": account.first_name,
        "last_name": account.last_name,
        "full_name": account.full_name(),
        "is_active": account.is_active,
        "date_joined": account.date_joined.to_rfc3339(),
        "last_login": account.last_login.map(|t| t.to_rfc3339()),
    })
}

pub fn profile_to_json(profile: &UserProfile) -> Value {
    json!({
        "user_id": profile.user_id.to_string(),
        "phone": profile.phone,
        "position": profile.position,
        "department": profile.department,
        "email": profile.email,
    })
}

/// A company member: account fields plus membership and profile.
pub fn member_to_json(record: &MemberRecord) -> Value {
    let mut value = account_to_json(&record.account);
    if let Some(fields) = value.as_object_mut() {
        fields.insert("account_active".into(), json!(record.account.is_active));
        fields.insert("is_active".into(), json!(record.membership.is_active()));
        fields.insert("role".into(), json!(record.membership.role()));
        fields.insert("membership".into(), membership_to_json(&record.membership));
        fields.insert("profile".into(), profile_to_json(&record.profile));
    }
    value
}

pub fn menu_section_to_json(section: &MenuSection, company_slug: &str) -> Value {
    json!({
        "id": section.id.to_string(),
        "title": section.title,
        "description": section.description,
        "icon": section.icon,
        "section_type": section.section_type,
        "url": section.url,
        "full_url": section.full_url(company_slug),
        "order": section.order,
        "is_active": section.is_active,
        "open_in_new_tab": section.open_in_new_tab,
        "required_role": section.required_role,
    })
}

pub fn messages_to_json(messages: &[FlashMessage]) -> Value {
    json!(messages)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use bizdesk_core::{CompanyId, UserId};

    use super::*;

    fn record(username: &str, department: &str, active: bool, joined_days_ago: i64) -> MemberRecord {
        let id = UserId::new();
        let account = UserAccount {
            id,
            username: username.into(),
            email: format!("{username}@example.com"),
            password_hash: String::new(),
            first_name: username.to_uppercase(),
            last_name: String::new(),
            is_active: true,
            is_staff: false,
            date_joined: Utc::now() - Duration::days(joined_days_ago),
            last_login: None,
        };
        let profile = UserProfile { department: department.into(), ..UserProfile::empty(id) };
        let membership = Membership::restore(CompanyId::new(), id, Role::Employee, active, Utc::now(), 1);
        MemberRecord { account, profile, membership }
    }

    fn usernames(records: &[MemberRecord]) -> Vec<&str> {
        records.iter().map(|r| r.account.username.as_str()).collect()
    }

    #[test]
    fn default_ordering_is_newest_first() {
        let records = vec![record("old", "", true, 10), record("new", "", true, 1)];
        let out = UserListQuery::default().apply(records);
        assert_eq!(usernames(&out), vec!["new", "old"]);
    }

    #[test]
    fn filters_combine() {
        let records = vec![
            record("anna", "Sales", true, 3),
            record("boris", "sales floor", false, 2),
            record("vera", "Finance", true, 1),
        ];
        let query = UserListQuery {
            department: Some("SALES".into()),
            is_active: Some(true),
            ..Default::default()
        };
        assert_eq!(usernames(&query.apply(records)), vec!["anna"]);
    }

    #[test]
    fn search_and_explicit_ordering() {
        let records = vec![record("zed", "", true, 1), record("zara", "", true, 2), record("ivan", "", true, 3)];
        let query = UserListQuery {
            q: Some("Z".into()),
            ordering: Some("username".into()),
            ..Default::default()
        };
        assert_eq!(usernames(&query.apply(records)), vec!["zara", "zed"]);
    }

    #[test]
    fn unknown_ordering_falls_back_to_default() {
        let records = vec![record("b", "", true, 5), record("a", "", true, 1)];
        let query = UserListQuery { ordering: Some("-password".into()), ..Default::default() };
        assert_eq!(usernames(&query.apply(records)), vec!["a", "b"]);
    }

    #[test]
    fn member_json_reports_membership_flag() {
        let json = member_to_json(&record("anna", "Sales", false, 1));
        assert_eq!(json["is_active"], false);
        assert_eq!(json["account_active"], true);
        assert_eq!(json["role"], "employee");
        assert_eq!(json["profile"]["department"], "Sales");
    }
}
