//! Writes relation links directly, without loading or saving entities.

mod remover;
pub(crate) use remover::remove;

mod updater;
pub(crate) use updater::{add, set};

use crate::{
    query::{referenced, EntityRef, InsertQueryBuilder, QueryBuilder},
    Db, Result,
};

use keel_core::{driver::QueryRunner, schema::Column, stmt::Value, Error, Registry};

use std::sync::Arc;

/// Where the generated statements run.
pub(crate) struct Link<'a> {
    pub(crate) db: &'a Db,
    pub(crate) runner: Option<&'a Arc<dyn QueryRunner>>,
    pub(crate) use_transaction: bool,
}

impl Link<'_> {
    fn bind<B: QueryBuilder>(&self, builder: B) -> B {
        let builder = builder.use_transaction(self.use_transaction);
        match self.runner {
            Some(runner) => builder.set_query_runner(runner.clone()),
            None => builder,
        }
    }

    fn bind_insert(&self, builder: InsertQueryBuilder) -> InsertQueryBuilder {
        let builder = builder.use_transaction(self.use_transaction);
        match self.runner {
            Some(runner) => builder.set_query_runner(runner.clone()),
            None => builder,
        }
    }

    fn registry(&self) -> &Registry {
        self.db.registry()
    }
}

/// The values `entity` holds for the columns `join_columns` reference.
fn key_of(registry: &Registry, join_columns: &[&Column], entity: &EntityRef) -> Result<Vec<Value>> {
    join_columns
        .iter()
        .map(|column| {
            let property = &referenced(registry, column)?.property_path;
            entity
                .property(property)
                .cloned()
                .ok_or_else(|| Error::entity_column_not_found(property))
        })
        .collect()
}

fn columns<'a>(registry: &'a Registry, ids: &[keel_core::schema::ColumnId]) -> Vec<&'a Column> {
    ids.iter().map(|id| registry.column(*id)).collect()
}

#[cfg(test)]
mod tests;
