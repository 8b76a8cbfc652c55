/// Row lock requested on a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub mode: LockMode,
    pub on_locked: Option<OnLocked>,

    /// `FOR UPDATE OF ...` targets (Postgres only).
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    PessimisticRead,
    PessimisticWrite,
    DirtyRead,
    PessimisticPartialWrite,
    PessimisticWriteOrFail,
    ForNoKeyUpdate,
    ForKeyShare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnLocked {
    Nowait,
    SkipLocked,
}

impl LockMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LockMode::PessimisticRead => "pessimistic_read",
            LockMode::PessimisticWrite => "pessimistic_write",
            LockMode::DirtyRead => "dirty_read",
            LockMode::PessimisticPartialWrite => "pessimistic_partial_write",
            LockMode::PessimisticWriteOrFail => "pessimistic_write_or_fail",
            LockMode::ForNoKeyUpdate => "for_no_key_update",
            LockMode::ForKeyShare => "for_key_share",
        }
    }
}
