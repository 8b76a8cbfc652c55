use super::Error;
use crate::stmt::Value;

/// The loaded entity's version (or update date) differs from the one the
/// caller locked on.
#[derive(Debug)]
pub struct OptimisticLockVersionMismatch {
    entity: Box<str>,
    expected: Value,
    actual: Value,
}

impl OptimisticLockVersionMismatch {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn expected(&self) -> &Value {
        &self.expected
    }

    pub fn actual(&self) -> &Value {
        &self.actual
    }
}

impl std::error::Error for OptimisticLockVersionMismatch {}

impl core::fmt::Display for OptimisticLockVersionMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "the optimistic lock on entity {} failed, version {} was expected, but is actually {}",
            self.entity, self.expected, self.actual
        )
    }
}

impl Error {
    pub fn optimistic_lock_version_mismatch(
        entity: impl Into<String>,
        expected: Value,
        actual: Value,
    ) -> Error {
        Error::from(super::ErrorKind::OptimisticLockVersionMismatch(
            OptimisticLockVersionMismatch {
                entity: entity.into().into(),
                expected,
                actual,
            },
        ))
    }

    pub fn is_optimistic_lock_version_mismatch(&self) -> bool {
        self.as_optimistic_lock_version_mismatch().is_some()
    }

    /// Returns the mismatch details if this error, or any error in its
    /// context chain, is a version mismatch.
    pub fn as_optimistic_lock_version_mismatch(&self) -> Option<&OptimisticLockVersionMismatch> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::OptimisticLockVersionMismatch(mismatch) => Some(mismatch),
            _ => None,
        })
    }
}
