//! Companies domain module (tenants, memberships, menus).
//!
//! Pure domain logic plus the tenant resolver. Storage is reached only
//! through the [`TenantDirectory`] trait.

pub mod company;
pub mod membership;
pub mod menu;
pub mod registration;
pub mod resolver;
pub mod settings;
pub mod slug;

pub use company::{Company, CompanyDetails, CompanyType, DEFAULT_COUNTRY};
pub use membership::{
    ChangeRole, CreateMembership, Membership, MembershipActor, MembershipCommand,
    MembershipEvent, MembershipKey, RemoveMembership, SetActive,
};
pub use menu::{MENU_ICONS, MenuSection, MenuSectionInput, SectionType};
pub use registration::{Registration, RegistrationInput};
pub use resolver::{
    COMPANIES_ROOT, NO_ACCESS_MESSAGE, REGISTER_PATH, Resolution, ResolveOutcome, ResolveRequest,
    SessionCompany, TenantDirectory, TenantResolver, slug_from_path,
};
pub use settings::{CompanySettings, SettingsChanges};
pub use slug::{RESERVED_SLUGS, decode_slug, encode_slug, is_reserved_slug, slugify, unique_slug};
