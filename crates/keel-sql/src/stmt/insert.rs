use super::{Expr, Returning, TablePath};

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TablePath,

    /// Physical column names. Empty inserts a row of defaults.
    pub columns: Vec<String>,

    /// One list of expressions per row, in column order.
    pub values: Vec<Vec<Expr>>,

    /// `INSERT IGNORE` / `ON CONFLICT DO NOTHING`
    pub or_ignore: bool,

    pub on_conflict: Option<OnConflict>,
    pub returning: Option<Returning>,
}

/// Upsert: overwrite `overwrite` columns when `conflict_target` collides.
#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    pub overwrite: Vec<String>,
    pub conflict_target: Vec<String>,
}

impl Insert {
    pub fn new(table: TablePath) -> Insert {
        Insert {
            table,
            columns: vec![],
            values: vec![],
            or_ignore: false,
            on_conflict: None,
            returning: None,
        }
    }
}
