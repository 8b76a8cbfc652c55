use super::Select;

/// A SQL expression.
///
/// Column references are kept structured until serialization so identifiers
/// are escaped per dialect; caller-written SQL enters as [`Expr::Raw`]
/// pieces interleaved with columns and parameters inside [`Expr::Seq`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `alias.column`, or a bare column when `table` is `None`
    Column(ExprColumn),

    /// A single escaped identifier, e.g. a select alias
    Ident(String),

    /// Named parameter (`:name`)
    Param(String),

    /// Spread parameter (`:...name`): one placeholder per list element
    ParamList(String),

    /// Verbatim SQL text
    Raw(String),

    /// Pieces written one after the other with no separator
    Seq(Vec<Expr>),

    BinaryOp(Box<Expr>, BinaryOp, Box<Expr>),

    /// Operands joined by ` AND `
    And(Vec<Expr>),

    /// Operands joined by ` OR `
    Or(Vec<Expr>),

    /// `NOT(expr)`
    Not(Box<Expr>),

    /// `(expr)`
    Paren(Box<Expr>),

    /// `expr IN (list)`; an empty list is the unsatisfiable `0=1`
    InList(Box<Expr>, Vec<Expr>),

    /// `expr IN (:...param)`
    InParam(Box<Expr>, String),

    Between(Box<Expr>, Box<Expr>, Box<Expr>),

    /// `expr IS NULL`, or `IS NOT NULL` when negated
    IsNull(Box<Expr>, bool),

    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        case_insensitive: bool,
    },

    /// `expr = ANY(rhs)` on Postgres, `expr IN (rhs)` elsewhere
    Any(Box<Expr>, Box<Expr>),

    Func(Func),

    Subquery(Box<Select>),

    /// `DEFAULT` inside an INSERT values list
    Default,

    CurrentTimestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprColumn {
    pub table: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Func {
    /// `COUNT(1)`
    CountAll,

    /// `COUNT(DISTINCT ...)` over one or more columns, rendered per dialect
    CountDistinct(Vec<Expr>),

    /// Spatial column read back as text (`ST_AsText` / `ST_AsGeoJSON`)
    SpatialAsText(Box<Expr>),
}

impl Expr {
    pub fn column(table: impl Into<String>, name: impl Into<String>) -> Expr {
        Expr::Column(ExprColumn {
            table: Some(table.into()),
            name: name.into(),
        })
    }

    pub fn bare_column(name: impl Into<String>) -> Expr {
        Expr::Column(ExprColumn {
            table: None,
            name: name.into(),
        })
    }

    pub fn param(name: impl Into<String>) -> Expr {
        Expr::Param(name.into())
    }

    pub fn raw(sql: impl Into<String>) -> Expr {
        Expr::Raw(sql.into())
    }

    pub fn binary_op(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
        Expr::BinaryOp(Box::new(lhs), op, Box::new(rhs))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary_op(lhs, BinaryOp::Eq, rhs)
    }

    pub fn paren(expr: Expr) -> Expr {
        Expr::Paren(Box::new(expr))
    }

    pub fn not(expr: Expr) -> Expr {
        Expr::Not(Box::new(expr))
    }

    pub fn is_null(expr: Expr) -> Expr {
        Expr::IsNull(Box::new(expr), false)
    }

    pub fn in_param(expr: Expr, param: impl Into<String>) -> Expr {
        Expr::InParam(Box::new(expr), param.into())
    }

    /// `AND` of the operands; a single operand is returned as is.
    pub fn and_from_vec(mut operands: Vec<Expr>) -> Expr {
        if operands.len() == 1 {
            return operands.remove(0);
        }
        Expr::And(operands)
    }

    /// `OR` of the operands; a single operand is returned as is.
    pub fn or_from_vec(mut operands: Vec<Expr>) -> Expr {
        if operands.len() == 1 {
            return operands.remove(0);
        }
        Expr::Or(operands)
    }

    pub fn is_empty_raw(&self) -> bool {
        match self {
            Expr::Raw(sql) => sql.trim().is_empty(),
            Expr::Seq(parts) => parts.iter().all(Expr::is_empty_raw),
            _ => false,
        }
    }

    /// Calls `f` on every named parameter referenced by the expression.
    pub fn visit_params(&self, f: &mut impl FnMut(&str)) {
        match self {
            Expr::Param(name) | Expr::ParamList(name) => f(name),
            Expr::InParam(expr, name) => {
                expr.visit_params(f);
                f(name);
            }
            Expr::Seq(items) | Expr::And(items) | Expr::Or(items) => {
                items.iter().for_each(|e| e.visit_params(f))
            }
            Expr::InList(expr, items) => {
                expr.visit_params(f);
                items.iter().for_each(|e| e.visit_params(f));
            }
            Expr::BinaryOp(lhs, _, rhs) | Expr::Any(lhs, rhs) => {
                lhs.visit_params(f);
                rhs.visit_params(f);
            }
            Expr::Not(e) | Expr::Paren(e) | Expr::IsNull(e, _) => e.visit_params(f),
            Expr::Between(e, low, high) => {
                e.visit_params(f);
                low.visit_params(f);
                high.visit_params(f);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.visit_params(f);
                pattern.visit_params(f);
            }
            Expr::Func(Func::CountDistinct(items)) => items.iter().for_each(|e| e.visit_params(f)),
            Expr::Func(Func::SpatialAsText(e)) => e.visit_params(f),
            Expr::Subquery(select) => select.visit_params(f),
            Expr::Column(_)
            | Expr::Ident(_)
            | Expr::Raw(_)
            | Expr::Func(Func::CountAll)
            | Expr::Default
            | Expr::CurrentTimestamp => {}
        }
    }
}
