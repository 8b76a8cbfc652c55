use super::{
    lower, mutation, update, ExpressionMap, QueryBuilder, QueryType, Session, UpdateResult,
    WhereExpressionBuilder,
};
use crate::{Db, Result};

use keel_core::{
    driver::QueryRunner,
    stmt::Value,
    Error,
};
use keel_sql::{
    stmt::{Expr, Update},
    Statement,
};

use indexmap::IndexMap;
use std::sync::Arc;

/// Marks rows deleted (or restores them) through the entity's delete date
/// column instead of removing them.
#[derive(Clone)]
pub struct SoftDeleteQueryBuilder {
    db: Db,
    map: ExpressionMap,
    runner: Option<Arc<dyn QueryRunner>>,
}

impl SoftDeleteQueryBuilder {
    pub(crate) fn soft_delete(db: Db) -> SoftDeleteQueryBuilder {
        SoftDeleteQueryBuilder::new(db, QueryType::SoftDelete)
    }

    pub(crate) fn restore(db: Db) -> SoftDeleteQueryBuilder {
        SoftDeleteQueryBuilder::new(db, QueryType::Restore)
    }

    fn new(db: Db, query_type: QueryType) -> SoftDeleteQueryBuilder {
        SoftDeleteQueryBuilder {
            db,
            map: ExpressionMap::new(query_type),
            runner: None,
        }
    }

    pub fn from(mut self, target: &str) -> Self {
        mutation::bind_target(&self.db, &mut self.map, target, None);
        self
    }

    mutation::returning_methods!();

    pub fn update_entity(mut self, enabled: bool) -> Self {
        self.map.update_entity = enabled;
        self
    }

    pub async fn execute(&self) -> Result<UpdateResult> {
        let (update, params) = self.build_update()?;
        let result = Session::run(
            &self.db,
            self.runner.as_ref(),
            self.map.use_transaction,
            &Statement::from(update),
            &params,
        )
        .await?;

        Ok(update::update_result(&self.db, &self.map, result))
    }

    fn build_update(&self) -> Result<(Update, IndexMap<String, Value>)> {
        self.map.check()?;
        mutation::reject_joins(&self.map, "UPDATE")?;

        let registry = self.db.registry();
        let alias = self.map.main_alias()?;
        let Some(metadata) = alias.metadata(registry) else {
            return Err(Error::missing_delete_date_column(&alias.name));
        };
        let Some(deleted_at) = metadata.delete_date_column() else {
            return Err(Error::missing_delete_date_column(&metadata.name));
        };

        let mut update = Update::new(mutation::target_table(registry, &self.map)?);
        let value = match self.map.query_type {
            QueryType::Restore => Expr::Raw("NULL".to_string()),
            _ => Expr::CurrentTimestamp,
        };
        update.assignments.push((deleted_at.database_name.clone(), value));
        update::auto_assignments(metadata, &mut update.assignments, true);

        let mut params = self.map.parameters.clone();
        update.filter = lower::where_expression(&self.db, &self.map, &mut params, false)?;
        update.returning = update::returning(&self.db, &self.map, Some(metadata));

        Ok((update, params))
    }
}

impl WhereExpressionBuilder for SoftDeleteQueryBuilder {
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

impl QueryBuilder for SoftDeleteQueryBuilder {
    fn query_runner_slot(&mut self) -> &mut Option<Arc<dyn QueryRunner>> {
        &mut self.runner
    }

    fn build_statement(&self) -> Result<(Statement, IndexMap<String, Value>)> {
        let (update, params) = self.build_update()?;
        Ok((update.into(), params))
    }
}

impl std::fmt::Debug for SoftDeleteQueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftDeleteQueryBuilder")
            .field("map", &self.map)
            .field("bound_runner", &self.runner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{driver::Capability, test_util};
    use pretty_assertions::assert_eq;
    use std_util::prelude::*;

    #[test]
    fn stamps_the_delete_date_and_bumps_the_version() {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        let sql = assert_ok!(db
            .soft_delete()
            .from("Post")
            .where_in_ids([7])
            .get_sql());
        assert_eq!(
            sql,
            r#"UPDATE "post" SET "deletedAt" = CURRENT_TIMESTAMP, "version" = "version" + 1 WHERE "id" IN ($1) RETURNING "version""#
        );
    }

    #[test]
    fn restore_clears_the_delete_date() {
        let (db, _) = test_util::db(&Capability::SQLITE);
        let sql = assert_ok!(db
            .restore()
            .from("Post")
            .update_entity(false)
            .get_sql());
        assert_eq!(
            sql,
            r#"UPDATE "post" SET "deletedAt" = NULL, "version" = "version" + 1"#
        );
    }

    #[test]
    fn needs_a_delete_date_column() {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        assert_err!(
            db.soft_delete().from("Tag").get_query(),
            Error::is_missing_delete_date_column
        );
    }
}
