use super::Error;

#[derive(Debug)]
pub(super) struct OptimisticLockCanNotBeUsed;

impl std::error::Error for OptimisticLockCanNotBeUsed {}

impl core::fmt::Display for OptimisticLockCanNotBeUsed {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("the optimistic lock can be used only with get_one() method")
    }
}

impl Error {
    pub fn optimistic_lock_can_not_be_used() -> Error {
        Error::from(super::ErrorKind::OptimisticLockCanNotBeUsed(
            OptimisticLockCanNotBeUsed,
        ))
    }

    pub fn is_optimistic_lock_can_not_be_used(&self) -> bool {
        self.any_kind(|kind| matches!(kind, super::ErrorKind::OptimisticLockCanNotBeUsed(_)))
    }
}
