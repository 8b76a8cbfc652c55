use super::{Formatter, Params, ToSql};

use crate::stmt::Limit;
use keel_core::{driver::DatabaseKind, Error};

/// LIMIT / OFFSET, rendered after ORDER BY.
pub(super) struct LimitClause<'a> {
    pub(super) limit: &'a Limit,

    /// SQL Server requires an ORDER BY before OFFSET ... FETCH.
    pub(super) has_order_by: bool,
}

impl ToSql for LimitClause<'_> {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let Limit { limit, offset } = *self.limit;

        match f.serializer.kind() {
            DatabaseKind::Sqlserver => {
                if (limit.is_some() || offset.is_some()) && !self.has_order_by {
                    fmt!(f, " ORDER BY (SELECT NULL)");
                }

                match (limit, offset) {
                    (Some(limit), Some(offset)) => {
                        fmt!(f, " OFFSET " offset " ROWS FETCH NEXT " limit " ROWS ONLY")
                    }
                    (Some(limit), None) => fmt!(f, " OFFSET 0 ROWS FETCH NEXT " limit " ROWS ONLY"),
                    (None, Some(offset)) => fmt!(f, " OFFSET " offset " ROWS"),
                    (None, None) => {}
                }
            }
            DatabaseKind::Oracle => match (limit, offset) {
                (Some(limit), Some(offset)) => {
                    fmt!(f, " OFFSET " offset " ROWS FETCH NEXT " limit " ROWS ONLY")
                }
                (Some(limit), None) => fmt!(f, " FETCH NEXT " limit " ROWS ONLY"),
                (None, Some(offset)) => fmt!(f, " OFFSET " offset " ROWS"),
                (None, None) => {}
            },
            kind if kind.is_mysql_family() => match (limit, offset) {
                (Some(limit), Some(offset)) => fmt!(f, " LIMIT " limit " OFFSET " offset),
                (Some(limit), None) => fmt!(f, " LIMIT " limit),
                (None, Some(_)) => f.fail(Error::offset_without_limit_not_supported()),
                (None, None) => {}
            },
            kind if kind.is_sqlite_family() => match (limit, offset) {
                (Some(limit), Some(offset)) => fmt!(f, " LIMIT " limit " OFFSET " offset),
                (Some(limit), None) => fmt!(f, " LIMIT " limit),
                (None, Some(offset)) => fmt!(f, " LIMIT -1 OFFSET " offset),
                (None, None) => {}
            },
            _ => {
                if let Some(limit) = limit {
                    fmt!(f, " LIMIT " limit);
                }
                if let Some(offset) = offset {
                    fmt!(f, " OFFSET " offset);
                }
            }
        }
    }
}
