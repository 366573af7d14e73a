//! Company-defined navigation sections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bizdesk_auth::{Role, TenantMembership};
use bizdesk_core::{CompanyId, DomainError, Entity, FieldErrors, MenuSectionId, TenantOwned, UserId};

use crate::slug::encode_slug;

pub const DEFAULT_ICON: &str = "bi-folder";
pub const DEFAULT_ORDER: u32 = 100;

/// Bootstrap icon classes a section may use.
pub const MENU_ICONS: &[&str] = &[
    "bi-people",
    "bi-cart",
    "bi-box",
    "bi-building",
    "bi-graph-up",
    "bi-calendar",
    "bi-folder",
    "bi-gear",
    "bi-file-text",
    "bi-chat",
    "bi-bell",
    "bi-shield",
    "bi-tools",
    "bi-pie-chart",
    "bi-clipboard",
    "bi-trophy",
    "bi-star",
    "bi-heart",
    "bi-lightning",
    "bi-cloud",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    /// A path inside the company (`/companies/<slug>/...`).
    #[default]
    Internal,
    /// An absolute link elsewhere.
    External,
    /// An external page embedded in a company page.
    Iframe,
}

impl SectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::Internal => "internal",
            SectionType::External => "external",
            SectionType::Iframe => "iframe",
        }
    }
}

impl core::str::FromStr for SectionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(SectionType::Internal),
            "external" => Ok(SectionType::External),
            "iframe" => Ok(SectionType::Iframe),
            other => Err(DomainError::invalid(format!("unknown section type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSection {
    pub id: MenuSectionId,
    pub company_id: CompanyId,
    pub created_by: UserId,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub section_type: SectionType,
    pub url: String,
    pub order: u32,
    pub is_active: bool,
    pub open_in_new_tab: bool,
    pub required_role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MenuSection {
    /// Build from validated input. Title uniqueness is the store's job.
    pub fn create(
        input: &MenuSectionInput,
        company_id: CompanyId,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut section = Self {
            id: MenuSectionId::new(),
            company_id,
            created_by,
            title: String::new(),
            description: String::new(),
            icon: DEFAULT_ICON.to_string(),
            section_type: SectionType::default(),
            url: String::new(),
            order: DEFAULT_ORDER,
            is_active: true,
            open_in_new_tab: false,
            required_role: Role::Employee,
            created_at: now,
            updated_at: now,
        };
        section.apply(input, now);
        section
    }

    pub fn apply(&mut self, input: &MenuSectionInput, now: DateTime<Utc>) {
        self.title = input.title.trim().to_string();
        self.description = input.description.trim().to_string();
        self.icon = input.icon.clone().unwrap_or_else(|| DEFAULT_ICON.to_string());
        self.section_type = input.section_type;
        self.url = input.url.trim().to_string();
        self.order = input.order.unwrap_or(DEFAULT_ORDER);
        self.is_active = input.is_active.unwrap_or(true);
        self.open_in_new_tab = input.open_in_new_tab;
        self.required_role = input.required_role.unwrap_or(Role::Employee);
        self.updated_at = now;
    }

    /// Link target as rendered in navigation.
    pub fn full_url(&self, company_slug: &str) -> String {
        let company_slug = encode_slug(company_slug);
        match self.section_type {
            SectionType::External => self.url.clone(),
            SectionType::Internal if self.url.starts_with('/') => {
                format!("/companies/{company_slug}{}", self.url)
            }
            SectionType::Internal => format!("/companies/{company_slug}/{}", self.url),
            SectionType::Iframe => format!("/companies/{company_slug}/iframe/{}/", self.id),
        }
    }

    /// Active sections are visible to roles at or above `required_role`.
    pub fn is_visible_to(&self, role: Role) -> bool {
        self.is_active && role.satisfies(self.required_role)
    }

    /// Access check against a concrete membership of the same company.
    pub fn can_access(&self, membership: &TenantMembership) -> bool {
        membership.company_id == self.company_id
            && membership.is_active
            && membership.role.satisfies(self.required_role)
    }

    /// Navigation order: `(order, title)`.
    pub fn sort(sections: &mut [MenuSection]) {
        sections.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.title.cmp(&b.title)));
    }
}

impl Entity for MenuSection {
    type Id = MenuSectionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantOwned for MenuSection {
    fn company_id(&self) -> CompanyId {
        self.company_id
    }
}

/// Create/edit form for a menu section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MenuSectionInput {
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    pub section_type: SectionType,
    pub url: String,
    pub order: Option<u32>,
    pub is_active: Option<bool>,
    pub open_in_new_tab: bool,
    pub required_role: Option<Role>,
}

impl MenuSectionInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.require("title", &self.title);
        errors.max_len("title", self.title.trim(), 100);
        errors.max_len("description", self.description.trim(), 200);
        errors.require("url", &self.url);
        errors.max_len("url", self.url.trim(), 500);

        if let Some(icon) = &self.icon {
            if !MENU_ICONS.contains(&icon.as_str()) {
                errors.add("icon", format!("Select a valid choice. {icon} is not one of the available choices."));
            }
        }

        let url = self.url.trim();
        let absolute = url.starts_with("http://") || url.starts_with("https://");
        match self.section_type {
            SectionType::External | SectionType::Iframe if !url.is_empty() && !absolute => {
                errors.add("url", "External and embedded sections need an absolute http(s) URL.");
            }
            SectionType::Internal if absolute => {
                errors.add("url", "Internal sections take a path inside the company, not a full URL.");
            }
            _ => {}
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn section(section_type: SectionType, url: &str) -> MenuSection {
        let input = MenuSectionInput {
            title: "Warehouse".into(),
            section_type,
            url: url.into(),
            ..Default::default()
        };
        MenuSection::create(&input, CompanyId::new(), UserId::new(), Utc::now())
    }

    #[test]
    fn defaults_apply() {
        let s = section(SectionType::Internal, "/orders/");
        assert_eq!(s.icon, DEFAULT_ICON);
        assert_eq!(s.order, DEFAULT_ORDER);
        assert_eq!(s.required_role, Role::Employee);
        assert!(s.is_active);
    }

    #[test]
    fn url_resolution_per_type() {
        assert_eq!(section(SectionType::Internal, "/orders/").full_url("acme"), "/companies/acme/orders/");
        assert_eq!(section(SectionType::Internal, "orders/").full_url("acme"), "/companies/acme/orders/");
        assert_eq!(
            section(SectionType::External, "https://example.com/x").full_url("acme"),
            "https://example.com/x"
        );
        let iframe = section(SectionType::Iframe, "https://example.com/embed");
        assert_eq!(iframe.full_url("acme"), format!("/companies/acme/iframe/{}/", iframe.id));
    }

    #[test]
    fn inactive_sections_are_hidden() {
        let mut s = section(SectionType::Internal, "/x/");
        s.is_active = false;
        assert!(!s.is_visible_to(Role::Owner));
    }

    #[test]
    fn access_requires_same_company_and_active_membership() {
        let s = section(SectionType::Internal, "/x/");
        assert!(s.can_access(&TenantMembership::new(s.company_id, Role::Manager, true)));
        assert!(!s.can_access(&TenantMembership::new(s.company_id, Role::Manager, false)));
        assert!(!s.can_access(&TenantMembership::new(CompanyId::new(), Role::Owner, true)));
    }

    #[test]
    fn validation_checks_icon_and_url_shape() {
        let input = MenuSectionInput {
            title: "Docs".into(),
            icon: Some("bi-unicorn".into()),
            section_type: SectionType::External,
            url: "docs/".into(),
            ..Default::default()
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.contains("icon"));
        assert!(errors.contains("url"));
    }

    #[test]
    fn sort_by_order_then_title() {
        let mut a = section(SectionType::Internal, "/a/");
        a.title = "B".into();
        let mut b = section(SectionType::Internal, "/b/");
        b.title = "A".into();
        let mut c = section(SectionType::Internal, "/c/");
        c.order = 1;
        let mut all = vec![a, b, c];
        MenuSection::sort(&mut all);
        let titles: Vec<_> = all.iter().map(|s| (s.order, s.title.as_str())).collect();
        assert_eq!(titles, vec![(1, "Warehouse"), (100, "A"), (100, "B")]);
    }

    proptest! {
        #[test]
        fn visibility_follows_hierarchy(
            member in prop::sample::select(Role::ALL.to_vec()),
            required in prop::sample::select(Role::ALL.to_vec()),
        ) {
            let mut s = section(SectionType::Internal, "/x/");
            s.required_role = required;
            prop_assert_eq!(s.is_visible_to(member), member.level() >= required.level());
        }
    }
}
