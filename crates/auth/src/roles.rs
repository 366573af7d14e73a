use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Membership role inside a company.
///
/// Variants are declared in hierarchy order, so the derived `Ord` is the
/// role hierarchy: `Viewer < Employee < Manager < Admin < Owner`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    #[default]
    Employee,
    Manager,
    Admin,
    Owner,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct RoleParseError(pub String);

impl Role {
    /// Every role, lowest first.
    pub const ALL: [Role; 5] = [
        Role::Viewer,
        Role::Employee,
        Role::Manager,
        Role::Admin,
        Role::Owner,
    ];

    /// Numeric hierarchy level (viewer = 1 … owner = 5).
    pub fn level(self) -> u8 {
        match self {
            Role::Viewer => 1,
            Role::Employee => 2,
            Role::Manager => 3,
            Role::Admin => 4,
            Role::Owner => 5,
        }
    }

    /// `true` when this role reaches at least `required` in the hierarchy.
    pub fn satisfies(self, required: Role) -> bool {
        self.level() >= required.level()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Role::Viewer => "Viewer",
            Role::Employee => "Employee",
            Role::Manager => "Manager",
            Role::Admin => "Administrator",
            Role::Owner => "Owner",
        }
    }

    /// Owner and admin hold full administrative rights.
    pub fn is_administrative(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Roles this role may hand out through the membership-edit flow.
    ///
    /// The owner role is never assignable; it is only created by company
    /// registration. Admins may only assign roles below their own.
    pub fn assignable_roles(self) -> &'static [Role] {
        match self {
            Role::Owner => &[Role::Admin, Role::Manager, Role::Employee, Role::Viewer],
            Role::Admin => &[Role::Manager, Role::Employee, Role::Viewer],
            Role::Manager | Role::Employee | Role::Viewer => &[],
        }
    }

    pub fn can_assign(self, target: Role) -> bool {
        self.assignable_roles().contains(&target)
    }

    /// Whether this role may edit a membership currently holding `target`.
    pub fn can_manage(self, target: Role) -> bool {
        match self {
            Role::Owner => target != Role::Owner,
            Role::Admin => target < Role::Admin,
            _ => false,
        }
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "employee" => Ok(Role::Employee),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    #[test]
    fn levels_follow_declaration_order() {
        let levels: Vec<u8> = Role::ALL.iter().map(|r| r.level()).collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn owner_is_never_assignable() {
        for role in Role::ALL {
            assert!(!role.can_assign(Role::Owner), "{role} could assign owner");
        }
    }

    #[test]
    fn admin_cannot_assign_admin() {
        assert!(Role::Owner.can_assign(Role::Admin));
        assert!(!Role::Admin.can_assign(Role::Admin));
        assert!(Role::Admin.can_assign(Role::Manager));
        assert!(Role::Manager.assignable_roles().is_empty());
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("superuser".parse::<Role>().is_err());
    }

    proptest! {
        #[test]
        fn satisfies_matches_ordering(a in any_role(), b in any_role()) {
            prop_assert_eq!(a.satisfies(b), a >= b);
        }

        #[test]
        fn as_str_roundtrips(role in any_role()) {
            prop_assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }

        #[test]
        fn assignable_roles_are_below_owner(actor in any_role(), target in any_role()) {
            if actor.can_assign(target) {
                prop_assert!(target < Role::Owner);
                prop_assert!(actor == Role::Owner || target < actor);
            }
        }
    }
}
