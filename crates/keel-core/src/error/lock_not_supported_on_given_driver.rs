use super::Error;

/// The requested lock mode has no rendering for the active database kind.
#[derive(Debug)]
pub(super) struct LockNotSupportedOnGivenDriver {
    mode: Box<str>,
}

impl std::error::Error for LockNotSupportedOnGivenDriver {}

impl core::fmt::Display for LockNotSupportedOnGivenDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "lock mode {} is not supported by the current database",
            self.mode
        )
    }
}

impl Error {
    pub fn lock_not_supported_on_given_driver(mode: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::LockNotSupportedOnGivenDriver(
            LockNotSupportedOnGivenDriver {
                mode: mode.into().into(),
            },
        ))
    }

    pub fn is_lock_not_supported_on_given_driver(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::LockNotSupportedOnGivenDriver(_)))
    }
}
