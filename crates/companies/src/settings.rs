use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bizdesk_core::{CompanyId, DomainResult, FieldErrors};

pub const DEFAULT_THEME_COLOR: &str = "#3B82F6";
pub const DEFAULT_CURRENCY: &str = "RUB";

/// Per-company preferences. Exactly one per company, created at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySettings {
    pub company_id: CompanyId,
    pub theme_color: String,
    pub allow_user_registration: bool,
    pub require_email_verification: bool,
    pub default_currency: String,
    pub order_approval_required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompanySettings {
    pub fn defaults(company_id: CompanyId, now: DateTime<Utc>) -> Self {
        Self {
            company_id,
            theme_color: DEFAULT_THEME_COLOR.to_string(),
            allow_user_registration: false,
            require_email_verification: true,
            default_currency: DEFAULT_CURRENCY.to_string(),
            order_approval_required: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_changes(&mut self, changes: &SettingsChanges, now: DateTime<Utc>) -> DomainResult<()> {
        changes.validate()?;
        if let Some(color) = &changes.theme_color {
            self.theme_color = color.trim().to_ascii_uppercase();
        }
        if let Some(v) = changes.allow_user_registration {
            self.allow_user_registration = v;
        }
        if let Some(v) = changes.require_email_verification {
            self.require_email_verification = v;
        }
        if let Some(currency) = &changes.default_currency {
            self.default_currency = currency.trim().to_string();
        }
        if let Some(v) = changes.order_approval_required {
            self.order_approval_required = v;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Partial settings update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettingsChanges {
    pub theme_color: Option<String>,
    pub allow_user_registration: Option<bool>,
    pub require_email_verification: Option<bool>,
    pub default_currency: Option<String>,
    pub order_approval_required: Option<bool>,
}

impl SettingsChanges {
    pub fn collect_errors(&self, errors: &mut FieldErrors) {
        if let Some(color) = &self.theme_color {
            if !is_hex_color(color.trim()) {
                errors.add("theme_color", "Enter a color in #RRGGBB format.");
            }
        }
        if let Some(currency) = &self.default_currency {
            let currency = currency.trim();
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                errors.add("default_currency", "Enter a three-letter currency code, e.g. RUB.");
            }
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        self.collect_errors(&mut errors);
        errors.into_result()
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_new_company_expectations() {
        let s = CompanySettings::defaults(CompanyId::new(), Utc::now());
        assert_eq!(s.theme_color, "#3B82F6");
        assert_eq!(s.default_currency, "RUB");
        assert!(!s.allow_user_registration);
        assert!(s.require_email_verification);
        assert!(s.order_approval_required);
    }

    #[test]
    fn partial_update_keeps_unset_fields() {
        let mut s = CompanySettings::defaults(CompanyId::new(), Utc::now());
        let changes = SettingsChanges {
            theme_color: Some("#10b981".into()),
            order_approval_required: Some(false),
            ..Default::default()
        };
        s.apply_changes(&changes, Utc::now()).unwrap();
        assert_eq!(s.theme_color, "#10B981");
        assert!(!s.order_approval_required);
        assert_eq!(s.default_currency, "RUB");
    }

    #[test]
    fn rejects_bad_color_and_currency() {
        let changes = SettingsChanges {
            theme_color: Some("blue".into()),
            default_currency: Some("rub".into()),
            ..Default::default()
        };
        let errors = changes.validate().unwrap_err();
        assert!(errors.contains("theme_color"));
        assert!(errors.contains("default_currency"));
    }
}
