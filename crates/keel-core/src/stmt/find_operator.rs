use super::Value;

use indexmap::IndexMap;
use std::sync::Arc;

/// A typed predicate used in object-style where maps.
///
/// Operators are built with the factory functions in this module and
/// consumed once when the where clause is lowered. `not` may wrap another
/// operator; [`FindOperator::value`] unwraps one level of nesting.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOperator {
    kind: OperatorKind,
    operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Not,
    LessThan,
    LessThanOrEqual,
    MoreThan,
    MoreThanOrEqual,
    Equal,
    Between,
    In,
    Any,
    IsNull,
    ILike,
    Like,
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    None,
    Value(Value),
    Nested(Box<FindOperator>),
    Raw(RawSql, IndexMap<String, Value>),
}

/// SQL text supplied verbatim by the caller, either fixed or produced from
/// the column alias the operator is applied to.
#[derive(Clone)]
pub enum RawSql {
    Text(String),
    Fn(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

/// Argument accepted by operators that take either a plain value or another
/// operator.
#[derive(Debug, Clone, PartialEq)]
pub enum FindOperand {
    Value(Value),
    Operator(FindOperator),
}

impl FindOperator {
    fn new(kind: OperatorKind, operand: Operand) -> FindOperator {
        FindOperator { kind, operand }
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    /// The wrapped operator, if this operator nests another one.
    pub fn child(&self) -> Option<&FindOperator> {
        match &self.operand {
            Operand::Nested(child) => Some(child),
            _ => None,
        }
    }

    /// The operator's value, unwrapping one level of nesting.
    pub fn value(&self) -> Option<&Value> {
        match &self.operand {
            Operand::Value(value) => Some(value),
            Operand::Nested(child) => child.value(),
            _ => None,
        }
    }

    /// Whether lowering binds the value as a SQL parameter.
    pub fn use_parameter(&self) -> bool {
        match &self.operand {
            Operand::Nested(child) => child.use_parameter(),
            Operand::Value(_) => !matches!(self.kind, OperatorKind::IsNull | OperatorKind::Raw),
            _ => false,
        }
    }

    /// Whether the value binds as several parameters.
    pub fn multiple_parameters(&self) -> bool {
        match &self.operand {
            Operand::Nested(child) => child.multiple_parameters(),
            _ => matches!(
                self.kind,
                OperatorKind::In | OperatorKind::Between | OperatorKind::Any
            ),
        }
    }

    /// The raw SQL and its parameters for `raw` operators.
    pub fn raw_sql(&self) -> Option<(&RawSql, &IndexMap<String, Value>)> {
        match &self.operand {
            Operand::Raw(sql, params) => Some((sql, params)),
            Operand::Nested(child) => child.raw_sql(),
            _ => None,
        }
    }
}

impl RawSql {
    /// Renders the raw SQL for the given column alias.
    pub fn render(&self, column: &str) -> String {
        match self {
            RawSql::Text(sql) => sql.clone(),
            RawSql::Fn(f) => f(column),
        }
    }
}

impl core::fmt::Debug for RawSql {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            RawSql::Text(sql) => f.debug_tuple("Text").field(sql).finish(),
            RawSql::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

impl PartialEq for RawSql {
    fn eq(&self, other: &RawSql) -> bool {
        match (self, other) {
            (RawSql::Text(a), RawSql::Text(b)) => a == b,
            (RawSql::Fn(a), RawSql::Fn(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn value_op(kind: OperatorKind, value: impl Into<Value>) -> FindOperator {
    FindOperator::new(kind, Operand::Value(value.into()))
}

pub fn not(operand: impl Into<FindOperand>) -> FindOperator {
    match operand.into() {
        FindOperand::Value(value) => value_op(OperatorKind::Not, value),
        FindOperand::Operator(op) => {
            FindOperator::new(OperatorKind::Not, Operand::Nested(Box::new(op)))
        }
    }
}

pub fn less_than(value: impl Into<Value>) -> FindOperator {
    value_op(OperatorKind::LessThan, value)
}

pub fn less_than_or_equal(value: impl Into<Value>) -> FindOperator {
    value_op(OperatorKind::LessThanOrEqual, value)
}

pub fn more_than(value: impl Into<Value>) -> FindOperator {
    value_op(OperatorKind::MoreThan, value)
}

pub fn more_than_or_equal(value: impl Into<Value>) -> FindOperator {
    value_op(OperatorKind::MoreThanOrEqual, value)
}

pub fn equal(value: impl Into<Value>) -> FindOperator {
    value_op(OperatorKind::Equal, value)
}

pub fn like(pattern: impl Into<Value>) -> FindOperator {
    value_op(OperatorKind::Like, pattern)
}

/// Case-insensitive `LIKE`.
pub fn ilike(pattern: impl Into<Value>) -> FindOperator {
    value_op(OperatorKind::ILike, pattern)
}

pub fn between(from: impl Into<Value>, to: impl Into<Value>) -> FindOperator {
    value_op(
        OperatorKind::Between,
        Value::List(vec![from.into(), to.into()]),
    )
}

/// Matches any of the given values. An empty list never matches.
pub fn in_list<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> FindOperator {
    value_op(
        OperatorKind::In,
        Value::List(values.into_iter().map(Into::into).collect()),
    )
}

/// Matches any element of an array parameter (`= ANY(..)` on Postgres).
pub fn any<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> FindOperator {
    value_op(
        OperatorKind::Any,
        Value::List(values.into_iter().map(Into::into).collect()),
    )
}

pub fn is_null() -> FindOperator {
    FindOperator::new(OperatorKind::IsNull, Operand::None)
}

pub fn raw(sql: impl Into<String>) -> FindOperator {
    FindOperator::new(
        OperatorKind::Raw,
        Operand::Raw(RawSql::Text(sql.into()), IndexMap::new()),
    )
}

/// Raw SQL built from the escaped column alias, e.g. `|col| format!("{col} > NOW()")`.
pub fn raw_fn(f: impl Fn(&str) -> String + Send + Sync + 'static) -> FindOperator {
    FindOperator::new(
        OperatorKind::Raw,
        Operand::Raw(RawSql::Fn(Arc::new(f)), IndexMap::new()),
    )
}

/// Raw SQL built from the column alias, with named parameters it references.
pub fn raw_with_params<K: Into<String>, V: Into<Value>>(
    f: impl Fn(&str) -> String + Send + Sync + 'static,
    params: impl IntoIterator<Item = (K, V)>,
) -> FindOperator {
    let params = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    FindOperator::new(OperatorKind::Raw, Operand::Raw(RawSql::Fn(Arc::new(f)), params))
}

impl From<FindOperator> for FindOperand {
    fn from(src: FindOperator) -> FindOperand {
        FindOperand::Operator(src)
    }
}

macro_rules! impl_operand_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FindOperand {
                fn from(src: $ty) -> FindOperand {
                    FindOperand::Value(src.into())
                }
            }
        )*
    };
}

impl_operand_from_value!(Value, bool, i32, i64, u32, f64, &str, String, uuid::Uuid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_value_is_unwrapped() {
        let op = not(equal(5));
        assert_eq!(op.kind(), OperatorKind::Not);
        assert_eq!(op.child().map(FindOperator::kind), Some(OperatorKind::Equal));
        assert_eq!(op.value(), Some(&Value::I64(5)));
        assert!(op.use_parameter());
        assert!(!op.multiple_parameters());
    }

    #[test]
    fn multi_parameter_operators() {
        assert!(in_list([1, 2]).multiple_parameters());
        assert!(between(1, 9).multiple_parameters());
        assert!(not(in_list([1, 2])).multiple_parameters());
        assert!(!is_null().use_parameter());
    }

    #[test]
    fn raw_fn_renders_column() {
        let op = raw_fn(|col| format!("{col} > 10"));
        let (sql, params) = op.raw_sql().unwrap();
        assert_eq!(sql.render("\"post\".\"likes\""), "\"post\".\"likes\" > 10");
        assert!(params.is_empty());
    }
}
