pub mod db;
pub use db::Db;

pub mod hydrate;
pub use hydrate::{Entity, EntityValue};

mod loader;

pub mod query;
pub use query::{
    Brackets, Condition, DeleteQueryBuilder, DeleteResult, EntityRef, InsertQueryBuilder,
    InsertResult, InsertValue, LockMode, QueryBuilder, RelationQueryBuilder, SelectQueryBuilder,
    SoftDeleteQueryBuilder, UpdateQueryBuilder, UpdateResult, ValueSet, Where, WhereBuilder,
    WhereExpressionBuilder, WhereValue,
};

mod relation;

#[cfg(test)]
mod test_util;

pub use keel_core::{
    async_trait, bail, err,
    driver::{self, Capability, Driver, QueryRunner},
    migration,
    schema::{
        self, ColumnDef, EmbeddedDef, EntityDef, IndexDef, JoinColumnDef, OrderDirection, RelationDef,
    },
    stmt::{self, FindOperator, Row, Value},
    Error, Registry, Result,
};

/// Everything needed to declare entities and build queries.
pub mod prelude {
    pub use crate::{
        query::{QueryBuilder, WhereExpressionBuilder},
        Brackets, ColumnDef, Db, EmbeddedDef, EntityDef, EntityRef, IndexDef, JoinColumnDef,
        OrderDirection, RelationDef, Row, Value, ValueSet, Where,
    };
    pub use keel_core::stmt::{
        any, between, equal, ilike, in_list, is_null, less_than, less_than_or_equal, like,
        more_than, more_than_or_equal, not, raw, raw_fn, raw_with_params,
    };
}
