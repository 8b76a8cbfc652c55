use super::Error;

#[derive(Debug)]
pub(super) struct UpdateValuesMissing;

impl std::error::Error for UpdateValuesMissing {}

impl core::fmt::Display for UpdateValuesMissing {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("cannot perform update query because update values are not defined; call set() first")
    }
}

impl Error {
    pub fn update_values_missing() -> Error {
        Error::from(super::ErrorKind::UpdateValuesMissing(UpdateValuesMissing))
    }

    pub fn is_update_values_missing(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::UpdateValuesMissing(_)))
    }
}
