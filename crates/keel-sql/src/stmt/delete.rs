use super::{Expr, Returning, TablePath};

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: TablePath,
    pub filter: Option<Expr>,
    pub returning: Option<Returning>,
}

impl Delete {
    pub fn new(table: TablePath) -> Delete {
        Delete {
            table,
            filter: None,
            returning: None,
        }
    }
}
