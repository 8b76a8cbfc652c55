mod alias;
pub use alias::{Alias, AliasKind};
pub(crate) use alias::{build_alias, AliasTarget};

mod attribute;
pub(crate) use attribute::{RelationCountAttribute, RelationIdAttribute};

mod builder;
pub use builder::{EntityRef, QueryBuilder, WhereExpressionBuilder};

mod condition;
pub use condition::{Brackets, Condition, Where, WhereBuilder, WhereValue};

mod delete;
pub use delete::{DeleteQueryBuilder, DeleteResult};

mod exec;
pub(crate) use exec::Session;

mod expression_map;
pub use expression_map::{ExpressionMap, QueryType};

mod insert;
pub use insert::{InsertQueryBuilder, InsertResult, InsertValue, ValueSet};

mod join;
pub(crate) use join::referenced;

mod lower;

mod mutation;

mod raw;

mod relation;
pub use relation::RelationQueryBuilder;

mod select;
pub use select::{LockMode, SelectQueryBuilder};
pub(crate) use select::{order_expr, selected_columns};

mod soft_delete;
pub use soft_delete::SoftDeleteQueryBuilder;

mod update;
pub use update::{UpdateQueryBuilder, UpdateResult};
