//! `bizdesk-core`: identifiers, errors and model traits shared by every
//! bizdesk crate. No HTTP, no storage.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod validation;
pub mod value_object;

pub use aggregate::{Aggregate, ExpectedVersion, Versioned};
pub use entity::{Entity, TenantOwned};
pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, MenuSectionId, UserId};
pub use validation::FieldErrors;
pub use value_object::ValueObject;
