use super::Error;

#[derive(Debug)]
pub(super) struct NoVersionOrUpdateDateColumn {
    entity: Box<str>,
}

impl std::error::Error for NoVersionOrUpdateDateColumn {}

impl core::fmt::Display for NoVersionOrUpdateDateColumn {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "entity {} does not have a version or update date column",
            self.entity
        )
    }
}

impl Error {
    /// An optimistic lock was requested on an entity with neither a version nor an update date column.
    pub fn no_version_or_update_date_column(entity: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::NoVersionOrUpdateDateColumn(
            NoVersionOrUpdateDateColumn {
                entity: entity.into().into(),
            },
        ))
    }

    pub fn is_no_version_or_update_date_column(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::NoVersionOrUpdateDateColumn(_)))
    }
}
