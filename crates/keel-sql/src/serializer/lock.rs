use super::{Formatter, Params, ToSql};

use crate::stmt::{Lock, LockMode, OnLocked};
use keel_core::{driver::DatabaseKind, err, Error};

/// Trailing lock clause of a select, e.g. ` FOR UPDATE OF "post" NOWAIT`.
pub(super) struct LockClause<'a>(pub(super) &'a Lock);

/// SQL Server table hint written after each table reference.
pub(super) struct TableHint<'a>(pub(super) Option<&'a Lock>);

impl ToSql for LockClause<'_> {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let lock = self.0;
        let kind = f.serializer.kind();
        let postgres = kind.is_postgres_family();
        let mysql = kind.is_mysql_family();

        let mut of_tables = String::new();
        if let Some(tables) = &lock.tables {
            if !postgres {
                f.fail(Error::unsupported_feature(
                    "lock tables are only supported by Postgres-family databases",
                ));
                return;
            }
            if tables.is_empty() {
                f.fail(err!("lock tables cannot be an empty list"));
                return;
            }
            of_tables = format!(" OF {}", tables.join(", "));
        }

        let of_tables = of_tables.as_str();
        let on_locked = match lock.on_locked {
            Some(OnLocked::Nowait) => " NOWAIT",
            Some(OnLocked::SkipLocked) => " SKIP LOCKED",
            None => "",
        };

        let unsupported = || Error::lock_not_supported_on_given_driver(lock.mode.as_str());

        match lock.mode {
            LockMode::PessimisticRead => {
                if matches!(kind, DatabaseKind::Mariadb | DatabaseKind::AuroraMysql) {
                    fmt!(f, " LOCK IN SHARE MODE");
                } else if mysql || postgres {
                    fmt!(f, " FOR SHARE" of_tables on_locked);
                } else if kind == DatabaseKind::Oracle {
                    fmt!(f, " FOR UPDATE");
                } else if kind != DatabaseKind::Sqlserver {
                    f.fail(unsupported());
                }
            }
            LockMode::PessimisticWrite => {
                if mysql || kind == DatabaseKind::Oracle {
                    fmt!(f, " FOR UPDATE" on_locked);
                } else if postgres {
                    fmt!(f, " FOR UPDATE" of_tables on_locked);
                } else if kind != DatabaseKind::Sqlserver {
                    f.fail(unsupported());
                }
            }
            LockMode::PessimisticPartialWrite => {
                if postgres {
                    fmt!(f, " FOR UPDATE" of_tables " SKIP LOCKED");
                } else if mysql {
                    fmt!(f, " FOR UPDATE SKIP LOCKED");
                } else {
                    f.fail(unsupported());
                }
            }
            LockMode::PessimisticWriteOrFail => {
                if postgres {
                    fmt!(f, " FOR UPDATE" of_tables " NOWAIT");
                } else if mysql {
                    fmt!(f, " FOR UPDATE NOWAIT");
                } else {
                    f.fail(unsupported());
                }
            }
            LockMode::ForNoKeyUpdate => {
                if postgres {
                    fmt!(f, " FOR NO KEY UPDATE" of_tables on_locked);
                } else {
                    f.fail(unsupported());
                }
            }
            LockMode::ForKeyShare => {
                if postgres {
                    fmt!(f, " FOR KEY SHARE" of_tables on_locked);
                } else {
                    f.fail(unsupported());
                }
            }
            LockMode::DirtyRead => {}
        }
    }
}

impl ToSql for TableHint<'_> {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        if f.serializer.kind() != DatabaseKind::Sqlserver {
            return;
        }

        match self.0.map(|lock| lock.mode) {
            Some(LockMode::PessimisticRead) => fmt!(f, " WITH (HOLDLOCK, ROWLOCK)"),
            Some(LockMode::PessimisticWrite) => fmt!(f, " WITH (UPDLOCK, ROWLOCK)"),
            Some(LockMode::DirtyRead) => fmt!(f, " WITH (NOLOCK)"),
            _ => {}
        }
    }
}
