use super::Error;

#[derive(Debug)]
pub(super) struct EntityColumnNotFound {
    path: Box<str>,
}

impl std::error::Error for EntityColumnNotFound {}

impl core::fmt::Display for EntityColumnNotFound {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "no entity column \"{}\" was found", self.path)
    }
}

impl Error {
    /// A property path used in a where object, set map or order map names no column.
    pub fn entity_column_not_found(path: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::EntityColumnNotFound(EntityColumnNotFound {
            path: path.into().into(),
        }))
    }

    pub fn is_entity_column_not_found(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::EntityColumnNotFound(_)))
    }
}
