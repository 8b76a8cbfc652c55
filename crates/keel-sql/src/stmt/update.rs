use super::{Expr, OrderBy, Returning, TablePath};

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: TablePath,

    /// `column = expr` pairs, column names physical.
    pub assignments: Vec<(String, Expr)>,

    pub filter: Option<Expr>,

    /// MySQL-family only.
    pub order_by: Vec<OrderBy>,

    /// MySQL-family only.
    pub limit: Option<u64>,

    pub returning: Option<Returning>,
}

impl Update {
    pub fn new(table: TablePath) -> Update {
        Update {
            table,
            assignments: vec![],
            filter: None,
            order_by: vec![],
            limit: None,
            returning: None,
        }
    }
}
