use super::{Formatter, Params, ToSql};

use crate::stmt::TablePath;

/// An identifier quoted for the active dialect.
pub(super) struct Ident<S>(pub(super) S);

impl<S: AsRef<str>> ToSql for Ident<S> {
    fn to_sql<T: Params>(self, f: &mut Formatter<'_, T>) {
        let quote = if f.serializer.kind().is_mysql_family() {
            '`'
        } else {
            '"'
        };

        f.dst.push(quote);
        for ch in self.0.as_ref().chars() {
            if ch == quote {
                f.dst.push(quote);
            }
            f.dst.push(ch);
        }
        f.dst.push(quote);
    }
}

impl ToSql for &TablePath {
    fn to_sql<T: Params>(self, f: &mut Formatter<'_, T>) {
        let mut s = "";
        for part in self.parts() {
            fmt!(f, s Ident(part));
            s = ".";
        }
    }
}
