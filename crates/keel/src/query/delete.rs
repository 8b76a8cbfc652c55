use super::{lower, mutation, ExpressionMap, QueryBuilder, QueryType, Session, WhereExpressionBuilder};
use crate::{Db, Result};

use keel_core::{
    driver::QueryRunner,
    stmt::{Row, Value},
};
use keel_sql::{stmt::Delete, Statement};

use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub affected: Option<u64>,
    pub raw: Vec<Row>,
}

/// Builds and runs DELETE statements.
#[derive(Clone)]
pub struct DeleteQueryBuilder {
    db: Db,
    map: ExpressionMap,
    runner: Option<Arc<dyn QueryRunner>>,
}

impl DeleteQueryBuilder {
    pub(crate) fn new(db: Db) -> DeleteQueryBuilder {
        DeleteQueryBuilder {
            db,
            map: ExpressionMap::new(QueryType::Delete),
            runner: None,
        }
    }

    /// Deletes from entity (or table) `target`.
    pub fn from(mut self, target: &str) -> Self {
        mutation::bind_target(&self.db, &mut self.map, target, None);
        self
    }

    mutation::returning_methods!();

    pub async fn execute(&self) -> Result<DeleteResult> {
        let (delete, params) = self.build_delete()?;
        let result = Session::run(
            &self.db,
            self.runner.as_ref(),
            self.map.use_transaction,
            &Statement::from(delete),
            &params,
        )
        .await?;

        Ok(DeleteResult {
            affected: result.affected,
            raw: result.records,
        })
    }

    fn build_delete(&self) -> Result<(Delete, IndexMap<String, Value>)> {
        self.map.check()?;
        mutation::reject_joins(&self.map, "DELETE")?;

        let registry = self.db.registry();
        let mut delete = Delete::new(mutation::target_table(registry, &self.map)?);
        let metadata = self.map.main_alias()?.metadata(registry);

        let mut params = self.map.parameters.clone();
        delete.filter = lower::where_expression(&self.db, &self.map, &mut params, false)?;
        delete.returning = mutation::requested_returning(&self.map, metadata);

        Ok((delete, params))
    }
}

impl WhereExpressionBuilder for DeleteQueryBuilder {
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

impl QueryBuilder for DeleteQueryBuilder {
    fn query_runner_slot(&mut self) -> &mut Option<Arc<dyn QueryRunner>> {
        &mut self.runner
    }

    fn build_statement(&self) -> Result<(Statement, IndexMap<String, Value>)> {
        let (delete, params) = self.build_delete()?;
        Ok((delete.into(), params))
    }
}

impl std::fmt::Debug for DeleteQueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteQueryBuilder")
            .field("map", &self.map)
            .field("bound_runner", &self.runner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{driver::Capability, test_util};
    use keel_core::driver::QueryResult;
    use pretty_assertions::assert_eq;
    use std_util::prelude::*;

    #[test]
    fn deletes_by_ids() {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        let (sql, params) = assert_ok!(db
            .delete()
            .from("Tag")
            .where_in_ids([1, 2])
            .get_query_and_parameters());

        assert_eq!(sql, r#"DELETE FROM "tag" WHERE "id" IN ($1, $2)"#);
        assert_eq!(params, vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn sqlserver_outputs_deleted_rows() {
        let (db, _) = test_util::db(&Capability::SQLSERVER);
        let sql = assert_ok!(db
            .delete()
            .from("Tag")
            .where_("Tag.label = :label")
            .set_parameter("label", "x")
            .returning(["id"])
            .get_sql());
        assert_eq!(sql, r#"DELETE FROM "tag" OUTPUT DELETED."id" WHERE "label" = @0"#);
    }

    #[tokio::test]
    async fn reports_affected_rows_and_releases_the_runner() {
        let (db, script) = test_util::db(&Capability::SQLITE);
        script
            .results
            .lock()
            .unwrap()
            .push_back(QueryResult::affected(3));

        let result = assert_ok!(db.delete().from("Tag").execute().await);
        assert_eq!(result.affected, Some(3));
        assert_eq!(script.sql(), vec![r#"DELETE FROM "tag""#.to_string()]);
        assert_eq!(script.released.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
