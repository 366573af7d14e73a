//! API-side authorization guards.
//!
//! Checks run against the request's [`TenantContext`] before any service
//! call, keeping the domain crates free of HTTP concerns.

use bizdesk_auth::{Capability, Role, authorize, require_role};

use crate::app::errors::ApiError;
use crate::context::TenantContext;

pub const USERS_DENIED: &str = "You do not have permission to manage users.";
pub const SETTINGS_VIEW_DENIED: &str = "You do not have permission to view company settings.";
pub const SETTINGS_EDIT_DENIED: &str = "Only the company owner can change settings.";
pub const MENU_DENIED: &str = "You do not have permission to manage the menu.";
pub const REPORTS_DENIED: &str = "You do not have permission to view reports.";

/// Require a capability of the current membership.
pub fn require_capability(tenant: &TenantContext, capability: Capability) -> Result<(), ApiError> {
    authorize(&tenant.principal(), capability).map_err(|err| {
        tracing::info!(
            user_id = %tenant.user_id(),
            company = %tenant.slug(),
            error = %err,
            "capability denied"
        );
        ApiError::from(err)
    })
}

/// Owner or admin of the current company.
pub fn require_admin(tenant: &TenantContext, denied: &str) -> Result<(), ApiError> {
    if tenant.grant().has_full_admin_rights() {
        return Ok(());
    }
    tracing::info!(user_id = %tenant.user_id(), company = %tenant.slug(), "admin rights required");
    Err(ApiError::forbidden(denied))
}

pub fn require_user_admin(tenant: &TenantContext) -> Result<(), ApiError> {
    require_admin(tenant, USERS_DENIED)
}

pub fn require_invite(tenant: &TenantContext) -> Result<(), ApiError> {
    if tenant.grant().can_invite_users() {
        return Ok(());
    }
    Err(ApiError::forbidden(USERS_DENIED))
}

/// Menu management: admin level or above.
pub fn require_menu_admin(tenant: &TenantContext) -> Result<(), ApiError> {
    require_role(&tenant.principal(), Role::Admin).map_err(|err| {
        tracing::info!(user_id = %tenant.user_id(), company = %tenant.slug(), error = %err, "menu management denied");
        ApiError::forbidden(MENU_DENIED)
    })
}

pub fn require_settings_owner(tenant: &TenantContext) -> Result<(), ApiError> {
    if tenant.grant().can_manage_company_settings() {
        return Ok(());
    }
    tracing::info!(user_id = %tenant.user_id(), company = %tenant.slug(), "settings change denied");
    Err(ApiError::forbidden(SETTINGS_EDIT_DENIED))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use bizdesk_companies::{Company, CompanyDetails, Membership};
    use bizdesk_core::UserId;

    use super::*;

    fn tenant(role: Role, active: bool) -> TenantContext {
        let user_id = UserId::new();
        let details = CompanyDetails { name: "Acme".into(), ..Default::default() };
        let company = Company::new(&details, "acme".into(), UserId::new(), Utc::now());
        let membership = Membership::restore(company.id, user_id, role, active, Utc::now(), 1);
        TenantContext::new(user_id, company, membership)
    }

    #[test]
    fn admins_pass_admin_guard() {
        assert!(require_user_admin(&tenant(Role::Owner, true)).is_ok());
        assert!(require_user_admin(&tenant(Role::Admin, true)).is_ok());
        assert!(require_user_admin(&tenant(Role::Manager, true)).is_err());
        assert!(require_user_admin(&tenant(Role::Admin, false)).is_err());
    }

    #[test]
    fn menu_guard_uses_hierarchy() {
        assert!(require_menu_admin(&tenant(Role::Admin, true)).is_ok());
        assert!(require_menu_admin(&tenant(Role::Manager, true)).is_err());
    }

    #[test]
    fn only_owner_edits_settings() {
        assert!(require_settings_owner(&tenant(Role::Owner, true)).is_ok());
        assert!(matches!(
            require_settings_owner(&tenant(Role::Admin, true)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn capability_guard_follows_role_table() {
        assert!(require_capability(&tenant(Role::Manager, true), Capability::ViewReports).is_ok());
        assert!(require_capability(&tenant(Role::Employee, true), Capability::ViewReports).is_err());
        assert!(require_capability(&tenant(Role::Employee, true), Capability::ManageOrders).is_ok());
        assert!(require_invite(&tenant(Role::Manager, true)).is_err());
    }
}
