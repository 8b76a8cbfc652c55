use super::Error;

#[derive(Debug)]
pub(super) struct MissingDeleteDateColumn {
    entity: Box<str>,
}

impl std::error::Error for MissingDeleteDateColumn {}

impl core::fmt::Display for MissingDeleteDateColumn {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "entity {} does not have a delete date column",
            self.entity
        )
    }
}

impl Error {
    /// Soft delete or restore was requested on an entity with no delete date column.
    pub fn missing_delete_date_column(entity: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::MissingDeleteDateColumn(
            MissingDeleteDateColumn {
                entity: entity.into().into(),
            },
        ))
    }

    pub fn is_missing_delete_date_column(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::MissingDeleteDateColumn(_)))
    }
}
