//! UUID-backed identifiers.
//!
//! Each record kind gets its own type so a user id can never be passed where
//! a company id is expected. All of them serialize as a bare UUID string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-ordered (v7) id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = DomainError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                raw.trim().parse::<Uuid>().map(Self).map_err(|_| {
                    DomainError::invalid(format!("'{raw}' is not a valid {}", stringify!($name)))
                })
            }
        }
    };
}

uuid_id! {
    /// A company, the tenant boundary.
    CompanyId
}

uuid_id! {
    /// A user account; one account may belong to many companies.
    UserId
}

uuid_id! {
    /// A navigation section of one company's menu.
    MenuSectionId
}
