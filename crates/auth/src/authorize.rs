use serde::Serialize;
use thiserror::Error;

use bizdesk_core::{CompanyId, UserId};

use crate::{Capabilities, Capability, Role, TenantMembership};

/// A fully resolved principal for authorization decisions.
///
/// Construction is decoupled from storage and transport: the API builds it
/// from the session user and the membership the tenant resolver attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub active_company_id: CompanyId,
    pub membership: TenantMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("membership is inactive")]
    InactiveMembership,

    #[error("forbidden: missing capability '{0}'")]
    Forbidden(Capability),

    #[error("forbidden: role '{actual}' is below required role '{required}'")]
    InsufficientRole { required: Role, actual: Role },
}

fn ensure_usable(principal: &Principal) -> Result<(), AuthzError> {
    if principal.active_company_id != principal.membership.company_id {
        return Err(AuthzError::TenantMismatch);
    }
    if !principal.membership.is_active {
        return Err(AuthzError::InactiveMembership);
    }
    Ok(())
}

/// Authorize a principal for a capability within its active company.
///
/// - No IO
/// - No panics
/// - Pure policy check
pub fn authorize(principal: &Principal, required: Capability) -> Result<(), AuthzError> {
    ensure_usable(principal)?;
    if principal.membership.capabilities.allows(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

/// Authorize a principal by minimum role (hierarchy comparison).
pub fn require_role(principal: &Principal, required: Role) -> Result<(), AuthzError> {
    ensure_usable(principal)?;
    let actual = principal.membership.role;
    if actual.satisfies(required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole { required, actual })
    }
}

/// Role definition with its granted capabilities (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: &'static str,
    pub label: &'static str,
    pub level: u8,
    pub capabilities: Capabilities,
    pub permissions: Vec<&'static str>,
    pub description: &'static str,
}

fn role_description(role: Role) -> &'static str {
    match role {
        Role::Owner => "Company owner; full rights including company settings",
        Role::Admin => "Administrator with full operational rights",
        Role::Manager => "Manages orders and products, sees reports",
        Role::Employee => "Works with orders",
        Role::Viewer => "Read-only access",
    }
}

/// Every role, highest first, with its fixed capability bundle.
pub fn role_registry() -> Vec<RoleDefinition> {
    Role::ALL
        .into_iter()
        .rev()
        .map(|role| {
            let capabilities = Capabilities::for_role(role);
            RoleDefinition {
                name: role.as_str(),
                label: role.label(),
                level: role.level(),
                capabilities,
                permissions: capabilities.granted().into_iter().map(Capability::as_str).collect(),
                description: role_description(role),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, active: bool) -> Principal {
        let company = CompanyId::new();
        Principal {
            user_id: UserId::new(),
            active_company_id: company,
            membership: TenantMembership::new(company, role, active),
        }
    }

    #[test]
    fn manager_can_view_reports_but_not_manage_users() {
        let p = principal(Role::Manager, true);
        assert!(authorize(&p, Capability::ViewReports).is_ok());
        assert_eq!(
            authorize(&p, Capability::ManageUsers),
            Err(AuthzError::Forbidden(Capability::ManageUsers))
        );
    }

    #[test]
    fn tenant_mismatch_is_rejected_before_capabilities() {
        let mut p = principal(Role::Owner, true);
        p.active_company_id = CompanyId::new();
        assert_eq!(authorize(&p, Capability::ManageOrders), Err(AuthzError::TenantMismatch));
    }

    #[test]
    fn inactive_membership_grants_nothing() {
        let p = principal(Role::Admin, false);
        assert_eq!(authorize(&p, Capability::ManageOrders), Err(AuthzError::InactiveMembership));
        assert!(require_role(&p, Role::Viewer).is_err());
    }

    #[test]
    fn require_role_uses_hierarchy() {
        let p = principal(Role::Employee, true);
        assert!(require_role(&p, Role::Viewer).is_ok());
        assert!(require_role(&p, Role::Employee).is_ok());
        assert_eq!(
            require_role(&p, Role::Manager),
            Err(AuthzError::InsufficientRole { required: Role::Manager, actual: Role::Employee })
        );
    }

    #[test]
    fn registry_lists_every_role_highest_first() {
        let registry = role_registry();
        let names: Vec<_> = registry.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["owner", "admin", "manager", "employee", "viewer"]);
        assert!(registry.last().unwrap().permissions.is_empty());
    }
}
