use super::Error;

/// Raised by the `*_or_fail` finders when no entity matched.
#[derive(Debug)]
pub(super) struct EntityNotFound {
    entity: Box<str>,
    criteria: Box<str>,
}

impl std::error::Error for EntityNotFound {}

impl core::fmt::Display for EntityNotFound {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "could not find any entity of type \"{}\" matching: {}",
            self.entity, self.criteria
        )
    }
}

impl Error {
    pub fn entity_not_found(entity: impl Into<String>, criteria: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::EntityNotFound(EntityNotFound {
            entity: entity.into().into(),
            criteria: criteria.into().into(),
        }))
    }

    pub fn is_entity_not_found(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::EntityNotFound(_)))
    }
}
