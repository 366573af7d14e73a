//! Identity of stored records.

use crate::id::CompanyId;

/// A record whose identity survives edits (an account, a company, a menu section).
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// A record that belongs to exactly one company.
///
/// Stores file these under their company, so every lookup has to name it.
pub trait TenantOwned {
    fn company_id(&self) -> CompanyId;
}
