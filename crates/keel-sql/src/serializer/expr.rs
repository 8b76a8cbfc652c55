use super::{Comma, Delimited, Formatter, Ident, Params, ToSql};

use crate::stmt::{self, BinaryOp, Func};
use keel_core::driver::DatabaseKind;

impl ToSql for &stmt::Expr {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self {
            stmt::Expr::Column(column) => {
                if let Some(table) = &column.table {
                    fmt!(f, Ident(table) ".");
                }
                fmt!(f, Ident(&column.name));
            }
            stmt::Expr::Ident(ident) => fmt!(f, Ident(ident)),
            stmt::Expr::Param(name) => f.param(name, false),
            stmt::Expr::ParamList(name) => f.param(name, true),
            stmt::Expr::Raw(sql) => fmt!(f, sql),
            stmt::Expr::Seq(items) => {
                for item in items {
                    fmt!(f, item);
                }
            }
            stmt::Expr::BinaryOp(lhs, op, rhs) => fmt!(f, lhs " " op " " rhs),
            stmt::Expr::And(operands) => fmt!(f, Delimited(operands, " AND ")),
            stmt::Expr::Or(operands) => fmt!(f, Delimited(operands, " OR ")),
            stmt::Expr::Not(expr) => fmt!(f, "NOT(" expr ")"),
            stmt::Expr::Paren(expr) => fmt!(f, "(" expr ")"),
            stmt::Expr::InList(expr, list) => {
                if list.is_empty() {
                    fmt!(f, "0=1");
                } else {
                    fmt!(f, expr " IN (" Comma(list) ")");
                }
            }
            stmt::Expr::InParam(expr, name) => {
                fmt!(f, expr " IN (");
                f.param(name, true);
                fmt!(f, ")");
            }
            stmt::Expr::Between(expr, low, high) => {
                fmt!(f, expr " BETWEEN " low " AND " high)
            }
            stmt::Expr::IsNull(expr, negate) => {
                let op = if *negate { " IS NOT NULL" } else { " IS NULL" };
                fmt!(f, expr op);
            }
            stmt::Expr::Like {
                expr,
                pattern,
                case_insensitive,
            } => {
                if !case_insensitive {
                    fmt!(f, expr " LIKE " pattern);
                } else if f.is_postgres_family() {
                    fmt!(f, expr " ILIKE " pattern);
                } else {
                    fmt!(f, "UPPER(" expr ") LIKE UPPER(" pattern ")");
                }
            }
            stmt::Expr::Any(expr, rhs) => {
                if f.is_postgres_family() {
                    fmt!(f, expr " = ANY(" rhs ")");
                } else {
                    fmt!(f, expr " IN (" rhs ")");
                }
            }
            stmt::Expr::Func(func) => func.to_sql(f),
            stmt::Expr::Subquery(select) => fmt!(f, "(" select ")"),
            stmt::Expr::Default => fmt!(f, "DEFAULT"),
            stmt::Expr::CurrentTimestamp => fmt!(f, "CURRENT_TIMESTAMP"),
        }
    }
}

impl ToSql for &BinaryOp {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        f.dst.push_str(match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
        })
    }
}

impl ToSql for &Func {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self {
            Func::CountAll => fmt!(f, "COUNT(1)"),
            Func::CountDistinct(columns) => match f.serializer.kind() {
                DatabaseKind::Postgres | DatabaseKind::Cockroachdb => {
                    fmt!(f, "COUNT(DISTINCT(" Comma(columns) "))")
                }
                kind if kind.is_mysql_family() => {
                    fmt!(f, "COUNT(DISTINCT " Comma(columns) ")")
                }
                DatabaseKind::Sqlserver if columns.len() > 1 => {
                    fmt!(f, "COUNT(DISTINCT(CONCAT(" Delimited(columns, ", '|;|', ") ")))")
                }
                _ => fmt!(f, "COUNT(DISTINCT(" Delimited(columns, " || '|;|' || ") "))"),
            },
            Func::SpatialAsText(expr) => match f.serializer.kind() {
                kind if kind.is_mysql_family() => fmt!(f, "ST_AsText(" expr ")"),
                DatabaseKind::Postgres => fmt!(f, "ST_AsGeoJSON(" expr ")::json"),
                _ => fmt!(f, expr),
            },
        }
    }
}
