use super::Error;

/// A property path referenced an alias that was never registered on the query.
#[derive(Debug)]
pub(super) struct AliasNotFound {
    alias: Box<str>,
}

impl std::error::Error for AliasNotFound {}

impl core::fmt::Display for AliasNotFound {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "\"{}\" alias was not found. Maybe you forgot to join it?",
            self.alias
        )
    }
}

impl Error {
    pub fn alias_not_found(alias: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::AliasNotFound(AliasNotFound {
            alias: alias.into().into(),
        }))
    }

    pub fn is_alias_not_found(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::AliasNotFound(_)))
    }
}
