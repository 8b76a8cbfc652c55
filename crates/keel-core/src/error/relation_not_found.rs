use super::Error;

#[derive(Debug)]
pub(super) struct RelationNotFound {
    entity: Box<str>,
    relation: Box<str>,
}

impl std::error::Error for RelationNotFound {}

impl core::fmt::Display for RelationNotFound {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "relation \"{}\" was not found in entity {}",
            self.relation, self.entity
        )
    }
}

impl Error {
    /// A relation property path does not resolve to a relation of `entity`.
    pub fn relation_not_found(entity: impl Into<String>, relation: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::RelationNotFound(RelationNotFound {
            entity: entity.into().into(),
            relation: relation.into().into(),
        }))
    }

    pub fn is_relation_not_found(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::RelationNotFound(_)))
    }
}
