use super::{Formatter, ToSql};

use keel_core::{driver::DatabaseKind, stmt::Value};

/// Collects positional parameter values in the order the driver binds them.
pub trait Params {
    fn push(&mut self, param: &Value) -> Placeholder;
}

/// 1-based position of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder(pub usize);

impl Params for Vec<Value> {
    fn push(&mut self, value: &Value) -> Placeholder {
        self.push(value.clone());
        Placeholder(self.len())
    }
}

impl ToSql for Placeholder {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        use std::fmt::Write;

        let _ = match f.serializer.kind() {
            DatabaseKind::Postgres | DatabaseKind::Cockroachdb => write!(f.dst, "${}", self.0),
            DatabaseKind::Sqlserver => write!(f.dst, "@{}", self.0 - 1),
            DatabaseKind::Oracle => write!(f.dst, ":{}", self.0),
            _ => write!(f.dst, "?"),
        };
    }
}
