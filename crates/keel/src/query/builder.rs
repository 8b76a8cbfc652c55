use super::{
    condition::{StoredCondition, WhereClause, WhereKind},
    lower::Lowering,
    Brackets, Condition, ExpressionMap, WhereBuilder,
};
use crate::{Db, Result};

use keel_core::{
    driver::QueryRunner,
    stmt::{Row, Value},
};
use keel_sql::Statement;

use indexmap::IndexMap;
use std::sync::Arc;

/// One entity named by its primary key, or by an object carrying its
/// primary (or referenced) properties.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRef {
    Id(Value),
    Object(Row),
}

impl EntityRef {
    /// The value of `property`: the id itself, or the object's property.
    pub(crate) fn property(&self, property: &str) -> Option<&Value> {
        match self {
            EntityRef::Id(value) => Some(value),
            EntityRef::Object(row) => row.get(property),
        }
    }
}

impl From<Row> for EntityRef {
    fn from(src: Row) -> EntityRef {
        EntityRef::Object(src)
    }
}

impl From<&EntityRef> for EntityRef {
    fn from(src: &EntityRef) -> EntityRef {
        src.clone()
    }
}

macro_rules! impl_entity_ref_from_id {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for EntityRef {
                fn from(src: $ty) -> EntityRef {
                    EntityRef::Id(src.into())
                }
            }
        )*
    };
}

impl_entity_ref_from_id!(Value, i32, i64, u32, &str, String, uuid::Uuid);

/// Condition methods shared by every builder and by [`Brackets`] groups.
///
/// Errors found while adding a condition (unknown alias, column or
/// relation, bad parameter name) are kept and returned by the first call
/// that builds or executes the query.
pub trait WhereExpressionBuilder: Sized {
    #[doc(hidden)]
    fn db(&self) -> &Db;

    #[doc(hidden)]
    fn expression_map(&self) -> &ExpressionMap;

    #[doc(hidden)]
    fn expression_map_mut(&mut self) -> &mut ExpressionMap;

    /// Replaces all conditions with `condition`.
    fn where_(mut self, condition: impl Into<Condition>) -> Self {
        self.expression_map_mut().wheres.clear();
        push_condition(&mut self, WhereKind::Simple, condition.into(), false);
        self
    }

    fn and_where(mut self, condition: impl Into<Condition>) -> Self {
        push_condition(&mut self, WhereKind::And, condition.into(), false);
        self
    }

    fn or_where(mut self, condition: impl Into<Condition>) -> Self {
        push_condition(&mut self, WhereKind::Or, condition.into(), false);
        self
    }

    /// Replaces all conditions with a primary key match.
    fn where_in_ids<T: Into<EntityRef>>(mut self, ids: impl IntoIterator<Item = T>) -> Self {
        self.expression_map_mut().wheres.clear();
        push_ids(&mut self, WhereKind::Simple, ids);
        self
    }

    fn and_where_in_ids<T: Into<EntityRef>>(mut self, ids: impl IntoIterator<Item = T>) -> Self {
        push_ids(&mut self, WhereKind::And, ids);
        self
    }

    fn or_where_in_ids<T: Into<EntityRef>>(mut self, ids: impl IntoIterator<Item = T>) -> Self {
        push_ids(&mut self, WhereKind::Or, ids);
        self
    }

    /// Binds a named parameter referenced as `:name` or `:...name`.
    fn set_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        let map = self.expression_map_mut();
        if let Err(err) = map.set_parameter(name, value.into()) {
            map.fail(err);
        }
        self
    }

    fn set_parameters<K: AsRef<str>, V: Into<Value>>(
        mut self,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let map = self.expression_map_mut();
        for (name, value) in params {
            if let Err(err) = map.set_parameter(name.as_ref(), value.into()) {
                map.fail(err);
            }
        }
        self
    }

    fn get_parameters(&self) -> &IndexMap<String, Value> {
        &self.expression_map().parameters
    }
}

/// Shared surface of the statement builders.
pub trait QueryBuilder: WhereExpressionBuilder {
    #[doc(hidden)]
    fn query_runner_slot(&mut self) -> &mut Option<Arc<dyn QueryRunner>>;

    /// Lowers the builder to a statement plus the named parameters it
    /// binds.
    #[doc(hidden)]
    fn build_statement(&self) -> Result<(Statement, IndexMap<String, Value>)>;

    /// Runs on `runner` instead of a runner obtained per execution. The
    /// builder never releases a runner it was given.
    fn set_query_runner(mut self, runner: Arc<dyn QueryRunner>) -> Self {
        *self.query_runner_slot() = Some(runner);
        self
    }

    /// Wraps execution in a transaction when none is active.
    fn use_transaction(mut self, enabled: bool) -> Self {
        self.expression_map_mut().use_transaction = enabled;
        self
    }

    /// SQL text with named parameters left as `:name`.
    fn get_query(&self) -> Result<String> {
        let (stmt, _) = self.build_statement()?;
        self.db().serializer().serialize_unbound(&stmt)
    }

    /// SQL text in the driver's placeholder style and the positional
    /// parameters it binds.
    fn get_query_and_parameters(&self) -> Result<(String, Vec<Value>)> {
        let (stmt, params) = self.build_statement()?;
        let mut bound = vec![];
        let sql = self.db().serializer().serialize(&stmt, &params, &mut bound)?;
        Ok((sql, bound))
    }

    fn get_sql(&self) -> Result<String> {
        Ok(self.get_query_and_parameters()?.0)
    }
}

pub(crate) fn push_condition<B: WhereExpressionBuilder>(
    builder: &mut B,
    kind: WhereKind,
    condition: Condition,
    having: bool,
) {
    let db = builder.db().clone();
    let map = builder.expression_map_mut();

    let stored = match condition {
        Condition::Raw(sql) => Ok(StoredCondition::Raw(sql)),
        Condition::Where(wheres) => Lowering::new(&db, map)
            .where_list(&wheres)
            .map(StoredCondition::Expr),
        Condition::Brackets(brackets) => Ok(group(&db, map, brackets)),
    };

    match stored {
        Ok(condition) => {
            let clause = WhereClause { kind, condition };
            if having {
                map.havings.push(clause);
            } else {
                map.wheres.push(clause);
            }
        }
        Err(err) => map.fail(err),
    }
}

fn push_ids<B: WhereExpressionBuilder, T: Into<EntityRef>>(
    builder: &mut B,
    kind: WhereKind,
    ids: impl IntoIterator<Item = T>,
) {
    let db = builder.db().clone();
    let map = builder.expression_map_mut();
    let ids: Vec<EntityRef> = ids.into_iter().map(Into::into).collect();

    match Lowering::new(&db, map).where_in_ids(&ids) {
        Ok(expr) => map.wheres.push(WhereClause {
            kind,
            condition: StoredCondition::Expr(expr),
        }),
        Err(err) => map.fail(err),
    }
}

/// Runs a [`Brackets`] closure against a copy of `map` with no conditions,
/// then takes back everything the closure added besides its conditions.
fn group(db: &Db, map: &mut ExpressionMap, brackets: Brackets) -> StoredCondition {
    let mut inner = map.clone();
    inner.wheres.clear();

    let built = (brackets.f)(WhereBuilder {
        db: db.clone(),
        map: inner,
    });
    let inner = built.map;

    map.parameters = inner.parameters;
    map.param_index = inner.param_index;
    map.aliases = inner.aliases;
    map.joins = inner.joins;
    if let Some(err) = inner.error {
        map.fail(err);
    }

    StoredCondition::Group {
        wheres: inner.wheres,
        negate: brackets.negate,
    }
}
