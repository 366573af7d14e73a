use serde::{Deserialize, Serialize};

use bizdesk_core::CompanyId;

use crate::{Capabilities, Role};

/// A user's grant inside one company.
///
/// This is an authorization boundary object: it states *which company* the
/// user is acting within and what the membership grants there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub company_id: CompanyId,
    pub role: Role,
    pub capabilities: Capabilities,
    pub is_active: bool,
}

impl TenantMembership {
    pub fn new(company_id: CompanyId, role: Role, is_active: bool) -> Self {
        Self {
            company_id,
            role,
            capabilities: Capabilities::for_role(role),
            is_active,
        }
    }

    pub fn has_full_admin_rights(&self) -> bool {
        self.role.is_administrative() && self.is_active
    }

    pub fn can_manage_company_settings(&self) -> bool {
        self.role == Role::Owner && self.is_active
    }

    pub fn can_invite_users(&self) -> bool {
        self.role.is_administrative() && self.capabilities.can_manage_users && self.is_active
    }
}
