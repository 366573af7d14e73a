//! Membership aggregate: a user's role inside one company.
//!
//! Capability flags are denormalized from the role on every event that sets
//! a role; there is no command that sets them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bizdesk_auth::{Capabilities, Capability, Role, TenantMembership};
use bizdesk_core::{Aggregate, CompanyId, DomainError, Entity, TenantOwned, UserId, Versioned};

/// Identity of a membership: one per (company, user).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipKey {
    pub company_id: CompanyId,
    pub user_id: UserId,
}

/// Who is issuing a membership command, as seen in the same company.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipActor {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    key: MembershipKey,
    role: Role,
    capabilities: Capabilities,
    is_active: bool,
    joined_at: DateTime<Utc>,
    version: u64,
    created: bool,
    removed: bool,
}

impl Membership {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(company_id: CompanyId, user_id: UserId) -> Self {
        Self {
            key: MembershipKey { company_id, user_id },
            role: Role::default(),
            capabilities: Capabilities::for_role(Role::default()),
            is_active: false,
            joined_at: DateTime::<Utc>::default(),
            version: 0,
            created: false,
            removed: false,
        }
    }

    /// Rebuild persisted state. Capabilities are recomputed from the role.
    pub fn restore(
        company_id: CompanyId,
        user_id: UserId,
        role: Role,
        is_active: bool,
        joined_at: DateTime<Utc>,
        version: u64,
    ) -> Self {
        Self {
            key: MembershipKey { company_id, user_id },
            role,
            capabilities: Capabilities::for_role(role),
            is_active,
            joined_at,
            version,
            created: true,
            removed: false,
        }
    }

    pub fn key(&self) -> MembershipKey {
        self.key
    }

    pub fn company_id(&self) -> CompanyId {
        self.key.company_id
    }

    pub fn user_id(&self) -> UserId {
        self.key.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    /// The authorization view of this membership.
    pub fn grant(&self) -> TenantMembership {
        TenantMembership::new(self.key.company_id, self.role, self.is_active && !self.removed)
    }

    pub fn as_actor(&self) -> MembershipActor {
        MembershipActor { user_id: self.key.user_id, role: self.role }
    }
}

impl Entity for Membership {
    type Id = MembershipKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }
}

impl TenantOwned for Membership {
    fn company_id(&self) -> CompanyId {
        self.key.company_id
    }
}

impl Versioned for Membership {
    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command: CreateMembership.
///
/// `actor: None` is the registration bootstrap, the only path that may
/// create an owner membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMembership {
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub role: Role,
    pub actor: Option<MembershipActor>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeRole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRole {
    pub actor: MembershipActor,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetActive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActive {
    pub actor: MembershipActor,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveMembership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMembership {
    pub actor: MembershipActor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipCommand {
    Create(CreateMembership),
    ChangeRole(ChangeRole),
    SetActive(SetActive),
    Remove(RemoveMembership),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipEvent {
    Created {
        key: MembershipKey,
        role: Role,
        capabilities: Capabilities,
        occurred_at: DateTime<Utc>,
    },
    RoleChanged {
        key: MembershipKey,
        from: Role,
        to: Role,
        capabilities: Capabilities,
        occurred_at: DateTime<Utc>,
    },
    Activated {
        key: MembershipKey,
        occurred_at: DateTime<Utc>,
    },
    Deactivated {
        key: MembershipKey,
        occurred_at: DateTime<Utc>,
    },
    Removed {
        key: MembershipKey,
        occurred_at: DateTime<Utc>,
    },
}

impl MembershipEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            MembershipEvent::Created { .. } => "companies.membership.created",
            MembershipEvent::RoleChanged { .. } => "companies.membership.role_changed",
            MembershipEvent::Activated { .. } => "companies.membership.activated",
            MembershipEvent::Deactivated { .. } => "companies.membership.deactivated",
            MembershipEvent::Removed { .. } => "companies.membership.removed",
        }
    }

    fn key(&self) -> MembershipKey {
        match self {
            MembershipEvent::Created { key, .. }
            | MembershipEvent::RoleChanged { key, .. }
            | MembershipEvent::Activated { key, .. }
            | MembershipEvent::Deactivated { key, .. }
            | MembershipEvent::Removed { key, .. } => *key,
        }
    }

    /// Emit a structured log line for this event.
    pub fn log(&self) {
        let key = self.key();
        match self {
            MembershipEvent::Created { role, capabilities, .. }
            | MembershipEvent::RoleChanged { to: role, capabilities, .. } => {
                let granted: Vec<&str> =
                    capabilities.granted().into_iter().map(Capability::as_str).collect();
                tracing::info!(
                    event = self.event_type(),
                    company_id = %key.company_id,
                    user_id = %key.user_id,
                    role = %role,
                    capabilities = ?granted,
                    "membership updated"
                );
            }
            _ => {
                tracing::info!(
                    event = self.event_type(),
                    company_id = %key.company_id,
                    user_id = %key.user_id,
                    "membership updated"
                );
            }
        }
    }
}

impl Aggregate for Membership {
    type Command = MembershipCommand;
    type Event = MembershipEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MembershipEvent::Created { key, role, capabilities, occurred_at } => {
                self.key = *key;
                self.role = *role;
                self.capabilities = *capabilities;
                self.is_active = true;
                self.joined_at = *occurred_at;
                self.created = true;
            }
            MembershipEvent::RoleChanged { to, capabilities, .. } => {
                self.role = *to;
                self.capabilities = *capabilities;
            }
            MembershipEvent::Activated { .. } => self.is_active = true,
            MembershipEvent::Deactivated { .. } => self.is_active = false,
            MembershipEvent::Removed { .. } => {
                self.is_active = false;
                self.removed = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MembershipCommand::Create(cmd) => self.handle_create(cmd),
            MembershipCommand::ChangeRole(cmd) => self.handle_change_role(cmd),
            MembershipCommand::SetActive(cmd) => self.handle_set_active(cmd),
            MembershipCommand::Remove(cmd) => self.handle_remove(cmd),
        }
    }
}

impl Membership {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.removed {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    /// The actor must outrank this membership (owner: anyone but an owner,
    /// admin: roles below admin).
    fn ensure_manageable_by(&self, actor: &MembershipActor) -> Result<(), DomainError> {
        if self.is_owner() {
            return Err(DomainError::forbidden("the company owner cannot be changed or removed"));
        }
        if !actor.role.can_manage(self.role) {
            return Err(DomainError::forbidden(format!(
                "role '{}' cannot manage a member with role '{}'",
                actor.role, self.role
            )));
        }
        Ok(())
    }

    fn ensure_not_self(&self, actor: &MembershipActor, what: &str) -> Result<(), DomainError> {
        if actor.user_id == self.key.user_id {
            return Err(DomainError::forbidden(format!("you cannot {what} yourself")));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateMembership) -> Result<Vec<MembershipEvent>, DomainError> {
        if self.created && !self.removed {
            return Err(DomainError::conflict("user is already a member of this company"));
        }
        match cmd.actor {
            None if cmd.role != Role::Owner => {
                return Err(DomainError::invariant("only the owner membership is created without an actor"));
            }
            Some(actor) if !actor.role.can_assign(cmd.role) => {
                return Err(DomainError::forbidden(format!(
                    "role '{}' cannot assign role '{}'",
                    actor.role, cmd.role
                )));
            }
            _ => {}
        }

        Ok(vec![MembershipEvent::Created {
            key: MembershipKey { company_id: cmd.company_id, user_id: cmd.user_id },
            role: cmd.role,
            capabilities: Capabilities::for_role(cmd.role),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_role(&self, cmd: &ChangeRole) -> Result<Vec<MembershipEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_manageable_by(&cmd.actor)?;
        if !cmd.actor.role.can_assign(cmd.role) {
            return Err(DomainError::forbidden(format!(
                "role '{}' cannot assign role '{}'",
                cmd.actor.role, cmd.role
            )));
        }
        if cmd.role == self.role {
            return Ok(vec![]);
        }

        Ok(vec![MembershipEvent::RoleChanged {
            key: self.key,
            from: self.role,
            to: cmd.role,
            capabilities: Capabilities::for_role(cmd.role),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_set_active(&self, cmd: &SetActive) -> Result<Vec<MembershipEvent>, DomainError> {
        self.ensure_live()?;
        if !cmd.active {
            self.ensure_not_self(&cmd.actor, "deactivate")?;
        }
        self.ensure_manageable_by(&cmd.actor)?;
        if cmd.active == self.is_active {
            return Ok(vec![]);
        }

        let event = if cmd.active {
            MembershipEvent::Activated { key: self.key, occurred_at: cmd.occurred_at }
        } else {
            MembershipEvent::Deactivated { key: self.key, occurred_at: cmd.occurred_at }
        };
        Ok(vec![event])
    }

    fn handle_remove(&self, cmd: &RemoveMembership) -> Result<Vec<MembershipEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_not_self(&cmd.actor, "remove")?;
        self.ensure_manageable_by(&cmd.actor)?;

        Ok(vec![MembershipEvent::Removed { key: self.key, occurred_at: cmd.occurred_at }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn company() -> CompanyId {
        CompanyId::new()
    }

    fn created(company_id: CompanyId, role: Role) -> Membership {
        Membership::restore(company_id, UserId::new(), role, true, Utc::now(), 1)
    }

    fn actor(role: Role) -> MembershipActor {
        MembershipActor { user_id: UserId::new(), role }
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    #[test]
    fn bootstrap_creates_owner_with_full_capabilities() {
        let c = company();
        let user = UserId::new();
        let mut m = Membership::empty(c, user);
        let events = m
            .execute(&MembershipCommand::Create(CreateMembership {
                company_id: c,
                user_id: user,
                role: Role::Owner,
                actor: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(m.is_owner());
        assert!(m.is_active());
        assert_eq!(m.version(), 1);
        assert_eq!(m.capabilities(), Capabilities::for_role(Role::Owner));
    }

    #[test]
    fn nobody_can_assign_owner() {
        let c = company();
        let m = Membership::empty(c, UserId::new());
        for role in Role::ALL {
            let cmd = MembershipCommand::Create(CreateMembership {
                company_id: c,
                user_id: UserId::new(),
                role: Role::Owner,
                actor: Some(actor(role)),
                occurred_at: Utc::now(),
            });
            assert!(matches!(m.handle(&cmd), Err(DomainError::Forbidden(_))));
        }
    }

    #[test]
    fn admin_cannot_grant_admin() {
        let m = created(company(), Role::Employee);
        let cmd = MembershipCommand::ChangeRole(ChangeRole {
            actor: actor(Role::Admin),
            role: Role::Admin,
            occurred_at: Utc::now(),
        });
        assert!(matches!(m.handle(&cmd), Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn admin_cannot_edit_another_admin() {
        let m = created(company(), Role::Admin);
        let cmd = MembershipCommand::SetActive(SetActive {
            actor: actor(Role::Admin),
            active: false,
            occurred_at: Utc::now(),
        });
        assert!(matches!(m.handle(&cmd), Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn role_change_recomputes_capabilities() {
        let mut m = created(company(), Role::Viewer);
        m.execute(&MembershipCommand::ChangeRole(ChangeRole {
            actor: actor(Role::Owner),
            role: Role::Manager,
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(m.role(), Role::Manager);
        assert!(m.capabilities().can_view_reports);
        assert!(!m.capabilities().can_manage_users);
        assert_eq!(m.version(), 2);
    }

    #[test]
    fn unchanged_role_emits_nothing() {
        let m = created(company(), Role::Employee);
        let events = m
            .handle(&MembershipCommand::ChangeRole(ChangeRole {
                actor: actor(Role::Owner),
                role: Role::Employee,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn cannot_deactivate_or_remove_self() {
        let m = created(company(), Role::Employee);
        let me = MembershipActor { user_id: m.user_id(), role: Role::Admin };
        let deactivate = MembershipCommand::SetActive(SetActive { actor: me, active: false, occurred_at: Utc::now() });
        let remove = MembershipCommand::Remove(RemoveMembership { actor: me, occurred_at: Utc::now() });
        assert!(matches!(m.handle(&deactivate), Err(DomainError::Forbidden(_))));
        assert!(matches!(m.handle(&remove), Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn removed_membership_is_gone() {
        let mut m = created(company(), Role::Viewer);
        m.execute(&MembershipCommand::Remove(RemoveMembership {
            actor: actor(Role::Owner),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert!(m.is_removed());
        assert!(!m.grant().is_active);
    }

    proptest! {
        #[test]
        fn owner_membership_is_immutable(actor_role in role_strategy(), target in role_strategy(), active in any::<bool>()) {
            let m = created(company(), Role::Owner);
            let a = actor(actor_role);
            let now = Utc::now();
            let cmds = [
                MembershipCommand::ChangeRole(ChangeRole { actor: a, role: target, occurred_at: now }),
                MembershipCommand::SetActive(SetActive { actor: a, active, occurred_at: now }),
                MembershipCommand::Remove(RemoveMembership { actor: a, occurred_at: now }),
            ];
            for cmd in cmds {
                prop_assert!(m.handle(&cmd).is_err());
            }
        }

        #[test]
        fn capabilities_always_follow_role(start in role_strategy(), target in role_strategy()) {
            prop_assume!(start != Role::Owner && target != Role::Owner);
            let mut m = created(company(), start);
            let _ = m.execute(&MembershipCommand::ChangeRole(ChangeRole {
                actor: actor(Role::Owner),
                role: target,
                occurred_at: Utc::now(),
            }));
            prop_assert_eq!(m.capabilities(), Capabilities::for_role(m.role()));
            prop_assert_eq!(m.role(), target);
        }
    }
}
