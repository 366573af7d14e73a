//! Command-driven models with optimistic versioning.

use crate::error::{DomainError, DomainResult};

/// State that counts its own changes.
///
/// The version grows by one per applied event; writes compare it against
/// the stored copy to detect lost updates.
pub trait Versioned {
    fn version(&self) -> u64;
}

/// What a write expects the stored version to be.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Last write wins.
    Any,
    Exact(u64),
}

impl ExpectedVersion {
    pub fn check(self, stored: u64) -> DomainResult<()> {
        match self {
            ExpectedVersion::Exact(expected) if expected != stored => Err(DomainError::conflict(format!(
                "record was modified concurrently (expected version {expected}, found {stored})"
            ))),
            _ => Ok(()),
        }
    }
}

/// A model that decides on commands by emitting events.
///
/// `handle` only decides; `apply` is the single place state changes. Both
/// are pure: saving the new state is up to the caller.
pub trait Aggregate: Versioned {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// `handle`, then `apply` every resulting event.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle(command)?;
        events.iter().for_each(|event| self.apply(event));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counter that refuses to go above a limit.
    #[derive(Debug, Default)]
    struct Capped {
        value: u32,
        version: u64,
    }

    impl Versioned for Capped {
        fn version(&self) -> u64 {
            self.version
        }
    }

    impl Aggregate for Capped {
        type Command = u32;
        type Event = u32;
        type Error = DomainError;

        fn apply(&mut self, event: &u32) {
            self.value += event;
            self.version += 1;
        }

        fn handle(&self, add: &u32) -> Result<Vec<u32>, DomainError> {
            if self.value + add > 10 {
                return Err(DomainError::forbidden("over the cap"));
            }
            Ok(vec![*add])
        }
    }

    #[test]
    fn execute_applies_only_accepted_commands() {
        let mut capped = Capped::default();
        capped.execute(&4).unwrap();
        assert!(capped.execute(&7).is_err());
        assert_eq!((capped.value, capped.version()), (4, 1));
    }

    #[test]
    fn stale_versions_conflict() {
        assert!(ExpectedVersion::Any.check(9).is_ok());
        assert!(ExpectedVersion::Exact(2).check(2).is_ok());
        assert!(matches!(ExpectedVersion::Exact(1).check(2), Err(DomainError::Conflict(_))));
    }
}
