use super::Error;

/// A named parameter is malformed or referenced without a bound value.
#[derive(Debug)]
pub(super) struct InvalidParameter {
    name: Box<str>,
    reason: Box<str>,
}

impl std::error::Error for InvalidParameter {}

impl core::fmt::Display for InvalidParameter {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "parameter \"{}\" {}", self.name, self.reason)
    }
}

impl Error {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidParameter(InvalidParameter {
            name: name.into().into(),
            reason: reason.into().into(),
        }))
    }

    pub fn is_invalid_parameter(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::InvalidParameter(_)))
    }
}
