use super::Error;

#[derive(Debug)]
pub(super) struct EntityMetadataNotFound {
    target: Box<str>,
}

impl std::error::Error for EntityMetadataNotFound {}

impl core::fmt::Display for EntityMetadataNotFound {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "no metadata for \"{}\" was found", self.target)
    }
}

impl Error {
    /// The registry has no entity registered under the given name or table.
    pub fn entity_metadata_not_found(target: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::EntityMetadataNotFound(
            EntityMetadataNotFound {
                target: target.into().into(),
            },
        ))
    }

    pub fn is_entity_metadata_not_found(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::EntityMetadataNotFound(_)))
    }
}
