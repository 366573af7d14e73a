use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bizdesk_core::{CompanyId, DomainError, Entity, FieldErrors, UserId};

use crate::slug::encode_slug;

pub const DEFAULT_COUNTRY: &str = "Russia";
pub const NAME_MAX_LEN: usize = 255;
pub const SLUG_MAX_LEN: usize = 100;

/// Legal form of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompanyType {
    #[default]
    Llc,
    Ip,
    Jsc,
    Cjsc,
    Other,
}

impl CompanyType {
    pub fn as_str(self) -> &'static str {
        match self {
            CompanyType::Llc => "LLC",
            CompanyType::Ip => "IP",
            CompanyType::Jsc => "JSC",
            CompanyType::Cjsc => "CJSC",
            CompanyType::Other => "OTHER",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CompanyType::Llc => "Limited liability company",
            CompanyType::Ip => "Sole proprietor",
            CompanyType::Jsc => "Joint-stock company",
            CompanyType::Cjsc => "Closed joint-stock company",
            CompanyType::Other => "Other",
        }
    }
}

impl core::str::FromStr for CompanyType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LLC" => Ok(CompanyType::Llc),
            "IP" => Ok(CompanyType::Ip),
            "JSC" => Ok(CompanyType::Jsc),
            "CJSC" => Ok(CompanyType::Cjsc),
            "OTHER" => Ok(CompanyType::Other),
            other => Err(DomainError::invalid(format!("unknown company type '{other}'"))),
        }
    }
}

/// The tenant root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub slug: String,
    pub company_type: CompanyType,
    pub description: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub tax_number: String,
    pub registration_number: String,
    pub is_active: bool,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Build a fresh, active company from validated details.
    pub fn new(details: &CompanyDetails, slug: String, owner_id: UserId, now: DateTime<Utc>) -> Self {
        let mut company = Self {
            id: CompanyId::new(),
            name: String::new(),
            slug,
            company_type: details.company_type,
            description: String::new(),
            phone: String::new(),
            email: String::new(),
            website: String::new(),
            address: String::new(),
            city: String::new(),
            country: DEFAULT_COUNTRY.to_string(),
            tax_number: String::new(),
            registration_number: String::new(),
            is_active: true,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        company.apply_details(details, now);
        company
    }

    /// Root path of every page of this company.
    pub fn base_path(&self) -> String {
        format!("/companies/{}", encode_slug(&self.slug))
    }

    pub fn dashboard_path(&self) -> String {
        format!("{}/dashboard/", self.base_path())
    }

    pub fn login_path(&self) -> String {
        format!("{}/", self.base_path())
    }

    /// Overwrite the editable fields. The slug never changes after creation.
    pub fn apply_details(&mut self, details: &CompanyDetails, now: DateTime<Utc>) {
        self.name = details.name.trim().to_string();
        self.company_type = details.company_type;
        self.description = details.description.trim().to_string();
        self.phone = details.phone.trim().to_string();
        self.email = details.email.trim().to_string();
        self.website = details.website.trim().to_string();
        self.address = details.address.trim().to_string();
        self.city = details.city.trim().to_string();
        let country = details.country.trim();
        self.country = if country.is_empty() { DEFAULT_COUNTRY.to_string() } else { country.to_string() };
        self.tax_number = details.tax_number.trim().to_string();
        self.registration_number = details.registration_number.trim().to_string();
        self.updated_at = now;
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Editable company fields (registration and the settings page).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyDetails {
    pub name: String,
    pub company_type: CompanyType,
    pub description: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub tax_number: String,
    pub registration_number: String,
}

impl CompanyDetails {
    pub fn from_company(company: &Company) -> Self {
        Self {
            name: company.name.clone(),
            company_type: company.company_type,
            description: company.description.clone(),
            phone: company.phone.clone(),
            email: company.email.clone(),
            website: company.website.clone(),
            address: company.address.clone(),
            city: company.city.clone(),
            country: company.country.clone(),
            tax_number: company.tax_number.clone(),
            registration_number: company.registration_number.clone(),
        }
    }

    /// Field checks; `name_field` lets registration report under `company_name`.
    pub fn collect_errors(&self, errors: &mut FieldErrors, name_field: &str, email_field: &str) {
        errors.require(name_field, &self.name);
        errors.max_len(name_field, self.name.trim(), NAME_MAX_LEN);
        errors.max_len("phone", self.phone.trim(), 20);
        errors.email(email_field, self.email.trim());
        errors.max_len("city", self.city.trim(), 100);
        errors.max_len("country", self.country.trim(), 100);
        errors.max_len("tax_number", self.tax_number.trim(), 50);
        errors.max_len("registration_number", self.registration_number.trim(), 50);
        let website = self.website.trim();
        if !website.is_empty() && !(website.starts_with("http://") || website.starts_with("https://")) {
            errors.add("website", "Enter a valid URL.");
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        self.collect_errors(&mut errors, "name", "email");
        errors.into_result()
    }
}
