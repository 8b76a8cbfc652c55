mod delete;
pub use delete::Delete;

mod expr;
pub use expr::{BinaryOp, Expr, ExprColumn, Func};

mod insert;
pub use insert::{Insert, OnConflict};

mod lock;
pub use lock::{Lock, LockMode, OnLocked};

mod select;
pub use select::{Distinct, Join, JoinKind, Limit, Nulls, OrderBy, Select, SelectItem, TableRef, TableSource};

mod update;
pub use update::Update;

pub use keel_core::schema::{OrderDirection, TablePath};
pub use keel_core::stmt::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

/// Columns returned by a data-modifying statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Returning {
    /// Physical column names, escaped on output.
    Columns(Vec<String>),

    /// Verbatim expression, e.g. `*`.
    Raw(String),
}

impl Statement {
    pub fn is_select(&self) -> bool {
        matches!(self, Statement::Select(_))
    }

    pub fn returning(&self) -> Option<&Returning> {
        match self {
            Statement::Select(_) => None,
            Statement::Insert(stmt) => stmt.returning.as_ref(),
            Statement::Update(stmt) => stmt.returning.as_ref(),
            Statement::Delete(stmt) => stmt.returning.as_ref(),
        }
    }
}

impl From<Select> for Statement {
    fn from(src: Select) -> Statement {
        Statement::Select(src)
    }
}

impl From<Insert> for Statement {
    fn from(src: Insert) -> Statement {
        Statement::Insert(src)
    }
}

impl From<Update> for Statement {
    fn from(src: Update) -> Statement {
        Statement::Update(src)
    }
}

impl From<Delete> for Statement {
    fn from(src: Delete) -> Statement {
        Statement::Delete(src)
    }
}
