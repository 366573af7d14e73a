use thiserror::Error;

use crate::validation::FieldErrors;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure of a domain rule. Storage and transport errors live in their own crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A single malformed value: an unknown enum name, an unparsable id.
    #[error("invalid value: {0}")]
    Invalid(String),

    /// Form input rejected field by field.
    #[error("invalid form: {0}")]
    Form(FieldErrors),

    /// State the model should never reach.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("not found")]
    NotFound,

    /// Duplicate record or stale version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting member may not do this.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl DomainError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether the caller can fix the request and retry.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Invalid(_) | Self::Form(_) | Self::Conflict(_))
    }
}

impl From<FieldErrors> for DomainError {
    fn from(errors: FieldErrors) -> Self {
        Self::Form(errors)
    }
}
