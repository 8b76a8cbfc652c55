use super::{
    limit::LimitClause,
    lock::{LockClause, TableHint},
    Comma, Formatter, Ident, Params, ToSql,
};

use crate::stmt::{self, Distinct, JoinKind, Nulls, Returning};
use keel_core::{
    driver::{self, DatabaseKind},
    Error,
};

impl ToSql for &stmt::Select {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        if let Some(comment) = &self.comment {
            let comment = comment.replace("*/", "");
            fmt!(f, "/* " comment.as_str() " */ ");
        }

        fmt!(f, "SELECT ");

        if let Some(ms) = self.max_execution_time {
            if f.is_mysql_family() {
                fmt!(f, "/*+ MAX_EXECUTION_TIME(" ms ") */ ");
            }
        }

        match &self.distinct {
            Distinct::None => {}
            Distinct::All => fmt!(f, "DISTINCT "),
            Distinct::On(exprs) => {
                if f.is_postgres_family() {
                    fmt!(f, "DISTINCT ON (" Comma(exprs) ") ");
                } else {
                    f.fail(Error::unsupported_feature(
                        "DISTINCT ON is only supported by Postgres-family databases",
                    ));
                }
            }
        }

        if self.projection.is_empty() {
            fmt!(f, "*");
        } else {
            fmt!(f, Comma(&self.projection));
        }

        let lock = self.lock.as_ref();

        if !self.from.is_empty() {
            fmt!(f, " FROM ");
            let mut s = "";
            for table in &self.from {
                fmt!(f, s table TableHint(lock));
                s = ", ";
            }
        }

        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Inner => " INNER JOIN ",
                JoinKind::Left => " LEFT JOIN ",
            };
            let table = &join.table;
            fmt!(f, kind table TableHint(lock));
            if let Some(on) = &join.on {
                fmt!(f, " ON " on);
            }
        }

        if let Some(filter) = &self.filter {
            fmt!(f, " WHERE " filter);
        }

        if !self.group_by.is_empty() {
            fmt!(f, " GROUP BY " Comma(&self.group_by));
        }

        if let Some(having) = &self.having {
            fmt!(f, " HAVING " having);
        }

        if !self.order_by.is_empty() {
            fmt!(f, " ORDER BY " Comma(&self.order_by));
        }

        fmt!(
            f,
            LimitClause {
                limit: &self.limit,
                has_order_by: !self.order_by.is_empty(),
            }
        );

        if let Some(lock) = lock {
            fmt!(f, LockClause(lock));
        }
    }
}

impl ToSql for &stmt::SelectItem {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        fmt!(f, &self.expr);
        if let Some(alias) = &self.alias {
            fmt!(f, " AS " Ident(alias));
        }
    }
}

impl ToSql for &stmt::TableRef {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match &self.source {
            stmt::TableSource::Table(path) => fmt!(f, path),
            stmt::TableSource::Subquery(select) => fmt!(f, "(" select ")"),
        }

        if let Some(alias) = &self.alias {
            fmt!(f, " " Ident(alias));
        }
    }
}

impl ToSql for &stmt::OrderBy {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        fmt!(f, &self.expr " " self.direction.as_sql());
        match self.nulls {
            Some(Nulls::First) => fmt!(f, " NULLS FIRST"),
            Some(Nulls::Last) => fmt!(f, " NULLS LAST"),
            None => {}
        }
    }
}

/// `RETURNING` / `OUTPUT` columns.
struct ReturningList<'a> {
    returning: &'a Returning,

    /// `INSERTED` / `DELETED` prefix for SQL Server.
    prefix: Option<&'static str>,
}

impl ToSql for ReturningList<'_> {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self.returning {
            Returning::Raw(sql) => fmt!(f, sql),
            Returning::Columns(columns) => {
                let mut s = "";
                for column in columns {
                    fmt!(f, s);
                    if let Some(prefix) = self.prefix {
                        fmt!(f, prefix ".");
                    }
                    fmt!(f, Ident(column));
                    s = ", ";
                }
            }
        }
    }
}

impl<P: Params> Formatter<'_, P> {
    /// Writes ` OUTPUT INSERTED.x` on SQL Server; a no-op elsewhere.
    fn output_clause(&mut self, returning: Option<&Returning>, prefix: &'static str) {
        if let Some(returning) = returning {
            if self.serializer.capability().returning == driver::Returning::Output {
                fmt!(
                    self,
                    " OUTPUT "
                    ReturningList {
                        returning,
                        prefix: Some(prefix),
                    }
                );
            }
        }
    }

    /// Writes ` RETURNING x` where supported; fails when the database cannot
    /// return rows at all.
    fn returning_clause(&mut self, returning: Option<&Returning>) {
        let Some(returning) = returning else {
            return;
        };

        match self.serializer.capability().returning {
            driver::Returning::Returning => fmt!(
                self,
                " RETURNING "
                ReturningList {
                    returning,
                    prefix: None,
                }
            ),
            driver::Returning::Output => {}
            driver::Returning::None => self.fail(Error::unsupported_feature(format!(
                "RETURNING is not supported by {:?}",
                self.serializer.kind()
            ))),
        }
    }
}

impl ToSql for &stmt::Insert {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let mysql = f.is_mysql_family();
        let kind = f.serializer.kind();
        let on_conflict_clause = f.is_postgres_family() || kind.is_sqlite_family();

        fmt!(f, "INSERT ");
        if self.or_ignore && mysql {
            fmt!(f, "IGNORE ");
        }
        let table = &self.table;
        fmt!(f, "INTO " table);

        let has_values = !self.columns.is_empty();
        if has_values {
            let columns = self.columns.iter().map(Ident);
            fmt!(f, "(" Comma(columns) ")");
        } else if mysql {
            fmt!(f, "()");
        }

        f.output_clause(self.returning.as_ref(), "INSERTED");

        if !has_values {
            if mysql {
                fmt!(f, " VALUES ()");
            } else {
                fmt!(f, " DEFAULT VALUES");
            }
        } else if kind == DatabaseKind::Oracle && self.values.len() > 1 {
            let mut s = " ";
            for row in &self.values {
                fmt!(f, s "SELECT " Comma(row) " FROM DUAL");
                s = " UNION ALL ";
            }
        } else {
            fmt!(f, " VALUES ");
            let mut s = "";
            for row in &self.values {
                fmt!(f, s "(" Comma(row) ")");
                s = ", ";
            }
        }

        if self.or_ignore && !mysql {
            if on_conflict_clause {
                fmt!(f, " ON CONFLICT DO NOTHING");
            } else {
                f.fail(Error::unsupported_feature(format!(
                    "INSERT ... or_ignore is not supported by {kind:?}"
                )));
            }
        }

        if let Some(on_conflict) = &self.on_conflict {
            if on_conflict_clause {
                fmt!(f, " ON CONFLICT ");
                if !on_conflict.conflict_target.is_empty() {
                    let target = on_conflict.conflict_target.iter().map(Ident);
                    fmt!(f, "( " Comma(target) " ) ");
                }
                fmt!(f, "DO UPDATE SET ");
                let mut s = "";
                for column in &on_conflict.overwrite {
                    fmt!(f, s Ident(column) " = EXCLUDED." Ident(column));
                    s = ", ";
                }
            } else if mysql {
                fmt!(f, " ON DUPLICATE KEY UPDATE ");
                let mut s = "";
                for column in &on_conflict.overwrite {
                    fmt!(f, s Ident(column) " = VALUES(" Ident(column) ")");
                    s = ", ";
                }
            } else {
                f.fail(Error::unsupported_feature(format!(
                    "INSERT ... or_update is not supported by {kind:?}"
                )));
            }
        }

        f.returning_clause(self.returning.as_ref());
    }
}

impl ToSql for &stmt::Update {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let table = &self.table;
        fmt!(f, "UPDATE " table " SET ");

        let mut s = "";
        for (column, expr) in &self.assignments {
            fmt!(f, s Ident(column) " = " expr);
            s = ", ";
        }

        f.output_clause(self.returning.as_ref(), "INSERTED");

        if let Some(filter) = &self.filter {
            fmt!(f, " WHERE " filter);
        }

        if !self.order_by.is_empty() || self.limit.is_some() {
            if f.is_mysql_family() {
                if !self.order_by.is_empty() {
                    fmt!(f, " ORDER BY " Comma(&self.order_by));
                }
                if let Some(limit) = self.limit {
                    fmt!(f, " LIMIT " limit);
                }
            } else {
                f.fail(Error::unsupported_feature(
                    "ORDER BY and LIMIT on UPDATE are only supported by MySQL-family databases",
                ));
            }
        }

        f.returning_clause(self.returning.as_ref());
    }
}

impl ToSql for &stmt::Delete {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let table = &self.table;
        fmt!(f, "DELETE FROM " table);

        f.output_clause(self.returning.as_ref(), "DELETED");

        if let Some(filter) = &self.filter {
            fmt!(f, " WHERE " filter);
        }

        f.returning_clause(self.returning.as_ref());
    }
}
