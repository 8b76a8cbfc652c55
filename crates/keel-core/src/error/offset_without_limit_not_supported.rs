use super::Error;

#[derive(Debug)]
pub(super) struct OffsetWithoutLimitNotSupported;

impl std::error::Error for OffsetWithoutLimitNotSupported {}

impl core::fmt::Display for OffsetWithoutLimitNotSupported {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(
            "the database does not support OFFSET without LIMIT in SELECT statements; \
             use take() together with skip() or limit() together with offset()",
        )
    }
}

impl Error {
    pub fn offset_without_limit_not_supported() -> Error {
        Error::from(super::ErrorKind::OffsetWithoutLimitNotSupported(
            OffsetWithoutLimitNotSupported,
        ))
    }

    pub fn is_offset_without_limit_not_supported(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::OffsetWithoutLimitNotSupported(_)))
    }
}
