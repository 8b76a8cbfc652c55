use super::{ExpressionMap, WhereExpressionBuilder};
use crate::Db;

use keel_core::stmt::{FindOperator, Value};
use keel_sql::stmt::Expr;

use indexmap::IndexMap;

/// Anything accepted by `where_`, `and_where` and `or_where`.
#[derive(Debug)]
pub enum Condition {
    /// SQL text with `alias.property` references and `:name` parameters.
    Raw(String),

    /// Object-style maps; several maps are OR'ed together.
    Where(Vec<Where>),

    /// A nested group of conditions.
    Brackets(Brackets),
}

impl From<&str> for Condition {
    fn from(src: &str) -> Condition {
        Condition::Raw(src.to_string())
    }
}

impl From<String> for Condition {
    fn from(src: String) -> Condition {
        Condition::Raw(src)
    }
}

impl From<&String> for Condition {
    fn from(src: &String) -> Condition {
        Condition::Raw(src.clone())
    }
}

impl From<Where> for Condition {
    fn from(src: Where) -> Condition {
        Condition::Where(vec![src])
    }
}

impl From<Vec<Where>> for Condition {
    fn from(src: Vec<Where>) -> Condition {
        Condition::Where(src)
    }
}

impl From<Brackets> for Condition {
    fn from(src: Brackets) -> Condition {
        Condition::Brackets(src)
    }
}

/// Object-style condition: property paths mapped to values, operators, or
/// nested maps for embedded objects and relations.
///
/// ```
/// # use keel::{Where, stmt::more_than};
/// let cond = Where::new()
///     .set("title", "Hello")
///     .set("likes", more_than(10))
///     .set("author", Where::new().set("name", "Ada"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where(IndexMap<String, WhereValue>);

#[derive(Debug, Clone, PartialEq)]
pub enum WhereValue {
    Value(Value),
    Operator(FindOperator),
    Nested(Where),
}

impl Where {
    pub fn new() -> Where {
        Where::default()
    }

    pub fn set(mut self, property: impl Into<String>, value: impl Into<WhereValue>) -> Where {
        self.0.insert(property.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WhereValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<FindOperator> for WhereValue {
    fn from(src: FindOperator) -> WhereValue {
        WhereValue::Operator(src)
    }
}

impl From<Where> for WhereValue {
    fn from(src: Where) -> WhereValue {
        WhereValue::Nested(src)
    }
}

macro_rules! impl_where_value_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for WhereValue {
                fn from(src: $ty) -> WhereValue {
                    WhereValue::Value(src.into())
                }
            }
        )*
    };
}

impl_where_value_from_value!(Value, bool, i32, i64, u32, f64, &str, String, uuid::Uuid);

type BracketsFn = Box<dyn FnOnce(WhereBuilder) -> WhereBuilder + Send>;

/// A parenthesized group of conditions built by a closure.
///
/// The closure receives a [`WhereBuilder`] sharing the enclosing query's
/// aliases and parameters; every condition it adds lands inside the group.
pub struct Brackets {
    pub(crate) f: BracketsFn,
    pub(crate) negate: bool,
}

impl Brackets {
    pub fn new(f: impl FnOnce(WhereBuilder) -> WhereBuilder + Send + 'static) -> Brackets {
        Brackets {
            f: Box::new(f),
            negate: false,
        }
    }

    /// `NOT(...)` around the group.
    pub fn not(f: impl FnOnce(WhereBuilder) -> WhereBuilder + Send + 'static) -> Brackets {
        Brackets {
            f: Box::new(f),
            negate: true,
        }
    }
}

impl core::fmt::Debug for Brackets {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Brackets")
            .field("negate", &self.negate)
            .finish_non_exhaustive()
    }
}

/// Builder handed to a [`Brackets`] closure.
pub struct WhereBuilder {
    pub(crate) db: Db,
    pub(crate) map: ExpressionMap,
}

impl WhereExpressionBuilder for WhereBuilder {
    fn db(&self) -> &Db {
        &self.db
    }

    fn expression_map(&self) -> &ExpressionMap {
        &self.map
    }

    fn expression_map_mut(&mut self) -> &mut ExpressionMap {
        &mut self.map
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WhereKind {
    Simple,
    And,
    Or,
}

/// One entry of a where or having list.
#[derive(Debug, Clone)]
pub(crate) struct WhereClause {
    pub(crate) kind: WhereKind,
    pub(crate) condition: StoredCondition,
}

#[derive(Debug, Clone)]
pub(crate) enum StoredCondition {
    /// Lexed when the statement is built, so joins added later still resolve.
    Raw(String),

    /// Already lowered.
    Expr(Expr),

    Group {
        wheres: Vec<WhereClause>,
        negate: bool,
    },
}
