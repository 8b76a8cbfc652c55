use super::Error;

#[derive(Debug)]
pub(super) struct PessimisticLockTransactionRequired;

impl std::error::Error for PessimisticLockTransactionRequired {}

impl core::fmt::Display for PessimisticLockTransactionRequired {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("an open transaction is required for pessimistic lock")
    }
}

impl Error {
    pub fn pessimistic_lock_transaction_required() -> Error {
        Error::from(super::ErrorKind::PessimisticLockTransactionRequired(
            PessimisticLockTransactionRequired,
        ))
    }

    pub fn is_pessimistic_lock_transaction_required(&self) -> bool {
        self.any_kind(|kind| {
            matches!(kind, super::ErrorKind::PessimisticLockTransactionRequired(_))
        })
    }
}
