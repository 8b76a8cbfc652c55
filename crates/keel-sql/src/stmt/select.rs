use super::{Expr, Lock, OrderDirection, TablePath};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Select {
    /// Emitted as a leading `/* comment */`.
    pub comment: Option<String>,

    /// MySQL optimizer hint, in milliseconds.
    pub max_execution_time: Option<u64>,

    pub distinct: Distinct,

    /// Empty selects `*`.
    pub projection: Vec<SelectItem>,

    pub from: Vec<TableRef>,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Limit,
    pub lock: Option<Lock>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub enum Distinct {
    #[default]
    None,
    All,

    /// Postgres `DISTINCT ON (...)`
    On(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub source: TableSource,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Table(TablePath),
    Subquery(Box<Select>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nulls {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: OrderDirection,
    pub nulls: Option<Nulls>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectItem {
    pub fn new(expr: Expr, alias: impl Into<String>) -> SelectItem {
        SelectItem {
            expr,
            alias: Some(alias.into()),
        }
    }
}

impl TableRef {
    pub fn table(path: TablePath, alias: impl Into<String>) -> TableRef {
        TableRef {
            source: TableSource::Table(path),
            alias: Some(alias.into()),
        }
    }

    pub fn subquery(select: Select, alias: impl Into<String>) -> TableRef {
        TableRef {
            source: TableSource::Subquery(Box::new(select)),
            alias: Some(alias.into()),
        }
    }
}

impl Select {
    /// Calls `f` on every named parameter referenced by the statement.
    pub fn visit_params(&self, f: &mut impl FnMut(&str)) {
        if let Distinct::On(exprs) = &self.distinct {
            exprs.iter().for_each(|e| e.visit_params(f));
        }
        for item in &self.projection {
            item.expr.visit_params(f);
        }
        for table in self.from.iter().chain(self.joins.iter().map(|j| &j.table)) {
            if let TableSource::Subquery(select) = &table.source {
                select.visit_params(f);
            }
        }
        for join in &self.joins {
            if let Some(on) = &join.on {
                on.visit_params(f);
            }
        }
        if let Some(filter) = &self.filter {
            filter.visit_params(f);
        }
        self.group_by.iter().for_each(|e| e.visit_params(f));
        if let Some(having) = &self.having {
            having.visit_params(f);
        }
        self.order_by.iter().for_each(|o| o.expr.visit_params(f));
    }
}
