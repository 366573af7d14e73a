//! `bizdesk-auth`: roles, capabilities, sessions and accounts.
//!
//! This crate is decoupled from HTTP and storage: it decides *who* may do
//! *what* inside a company, never how requests or rows look.

pub mod authorize;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;
pub mod user;

pub use authorize::{AuthzError, Principal, RoleDefinition, authorize, require_role, role_registry};
pub use password::{PasswordError, generate_temporary_password, hash_password, verify_password};
pub use permissions::{Capabilities, Capability};
pub use principal::TenantMembership;
pub use roles::{Role, RoleParseError};
pub use session::{
    CurrentCompany, FlashLevel, FlashMessage, Session, SessionToken, SessionValidationError,
    validate_session,
};
pub use user::{AccountChanges, NewAccount, ProfileChanges, UserAccount, UserProfile};
