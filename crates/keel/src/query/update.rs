use super::{
    expression_map::OrderEntry, lower, mutation, order_expr, raw, ExpressionMap, InsertValue,
    QueryBuilder, QueryType, Session, ValueSet, WhereExpressionBuilder,
};
use crate::{Db, Result};

use keel_core::{
    driver::{QueryResult, QueryRunner},
    schema::{EntityMetadata, OrderDirection},
    stmt::{Row, Value},
    Error, Registry,
};
use keel_sql::{
    stmt::{BinaryOp, Expr, OrderBy, Returning, Update},
    Statement,
};

use indexmap::IndexMap;
use std::sync::Arc;

/// What an UPDATE (or soft delete / restore) returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub affected: Option<u64>,
    pub raw: Vec<Row>,

    /// Returned rows keyed by property path.
    pub generated_maps: Vec<Row>,
}

/// Builds and runs UPDATE statements.
///
/// Versioned entities get `version = version + 1` and entities with an
/// update date get `CURRENT_TIMESTAMP` unless the caller sets them.
#[derive(Clone)]
pub struct UpdateQueryBuilder {
    db: Db,
    map: ExpressionMap,
    runner: Option<Arc<dyn QueryRunner>>,
    values: ValueSet,
}

impl UpdateQueryBuilder {
    pub(crate) fn new(db: Db, target: &str) -> UpdateQueryBuilder {
        let mut map = ExpressionMap::new(QueryType::Update);
        mutation::bind_target(&db, &mut map, target, None);

        UpdateQueryBuilder {
            db,
            map,
            runner: None,
            values: ValueSet::new(),
        }
    }

    /// Values to write, keyed by property path.
    pub fn set(mut self, values: impl Into<ValueSet>) -> Self {
        self.values = values.into();
        self
    }

    /// MySQL-family only.
    pub fn order_by(mut self, sort: &str, direction: OrderDirection) -> Self {
        self.map.order_bys.clear();
        self.add_order_by(sort, direction)
    }

    pub fn add_order_by(mut self, sort: &str, direction: OrderDirection) -> Self {
        self.map
            .order_bys
            .insert(sort.to_string(), OrderEntry { direction, nulls: None });
        self
    }

    /// MySQL-family only.
    pub fn limit(mut self, limit: u64) -> Self {
        self.map.limit = Some(limit);
        self
    }

    mutation::returning_methods!();

    /// Reads the new version and update date back when the database can
    /// return rows. On by default.
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

        Ok(update_result(&self.db, &self.map, result))
    }

    fn build_update(&self) -> Result<(Update, IndexMap<String, Value>)> {
        self.map.check()?;
        if self.values.is_empty() {
            return Err(Error::update_values_missing());
        }
        mutation::reject_joins(&self.map, "UPDATE")?;

        let registry: &Registry = self.db.registry();
        let mut map = self.map.clone();
        let mut update = Update::new(mutation::target_table(registry, &map)?);
        let metadata = map.main_alias()?.metadata(registry);

        match metadata {
            Some(metadata) => {
                for (path, value) in self.values.iter() {
                    let column = raw::resolve_path(registry, metadata, path).ok_or_else(|| {
                        Error::entity_column_not_found(format!("{}.{path}", metadata.name))
                    })?;
                    if !column.update {
                        continue;
                    }

                    let expr = self.value_expr(&mut map, value, column.default.as_deref());
                    update.assignments.push((column.database_name.clone(), expr));
                }
                auto_assignments(metadata, &mut update.assignments, false);
            }
            None => {
                for (column, value) in self.values.iter() {
                    let expr = self.value_expr(&mut map, value, None);
                    update.assignments.push((column.to_string(), expr));
                }
            }
        }

        let mut params = map.parameters.clone();
        update.filter = lower::where_expression(&self.db, &map, &mut params, false)?;

        update.order_by = map
            .order_bys
            .iter()
            .map(|(key, entry)| OrderBy {
                expr: order_expr(&map, registry, key),
                direction: entry.direction,
                nulls: entry.nulls,
            })
            .collect();
        update.limit = map.limit;
        update.returning = returning(&self.db, &map, metadata);

        Ok((update, params))
    }

    fn value_expr(&self, map: &mut ExpressionMap, value: &InsertValue, default: Option<&str>) -> Expr {
        match value {
            InsertValue::Value(value) => Expr::Param(map.create_parameter(value.clone())),
            InsertValue::Raw(f) => Expr::raw(f()),
            InsertValue::Default => match default {
                Some(default) => Expr::raw(default),
                None => Expr::Default,
            },
        }
    }
}

/// `version = version + 1` and `updatedAt = CURRENT_TIMESTAMP` for the
/// columns not already assigned. `always` also bumps columns the caller
/// cannot have assigned (soft delete and restore).
pub(crate) fn auto_assignments(
    metadata: &EntityMetadata,
    assignments: &mut Vec<(String, Expr)>,
    always: bool,
) {
    let assigned = |assignments: &Vec<(String, Expr)>, name: &str| {
        !always && assignments.iter().any(|(column, _)| column == name)
    };

    if let Some(version) = metadata.version_column() {
        if !assigned(assignments, &version.database_name) {
            assignments.push((
                version.database_name.clone(),
                Expr::binary_op(
                    Expr::bare_column(&version.database_name),
                    BinaryOp::Add,
                    Expr::raw("1"),
                ),
            ));
        }
    }

    if let Some(updated) = metadata.update_date_column() {
        if !assigned(assignments, &updated.database_name) {
            assignments.push((updated.database_name.clone(), Expr::CurrentTimestamp));
        }
    }
}

/// The caller's returning list, or the version and update date columns
/// when the entity is to be updated and the database can return rows.
pub(crate) fn returning(
    db: &Db,
    map: &ExpressionMap,
    metadata: Option<&EntityMetadata>,
) -> Option<Returning> {
    if let Some(requested) = mutation::requested_returning(map, metadata) {
        return Some(requested);
    }

    let metadata = metadata?;
    if !map.update_entity || !db.capability().is_returning_supported() {
        return None;
    }

    let columns: Vec<String> = metadata
        .version_column()
        .into_iter()
        .chain(metadata.update_date_column())
        .map(|column| column.database_name.clone())
        .collect();

    (!columns.is_empty()).then_some(Returning::Columns(columns))
}

pub(crate) fn update_result(db: &Db, map: &ExpressionMap, result: QueryResult) -> UpdateResult {
    let metadata = map
        .main_alias()
        .ok()
        .and_then(|alias| alias.metadata(db.registry()));

    UpdateResult {
        affected: result.affected,
        generated_maps: result
            .records
            .iter()
            .map(|row| mutation::generated_map(metadata, row))
            .collect(),
        raw: result.records,
    }
}

impl WhereExpressionBuilder for UpdateQueryBuilder {
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

impl QueryBuilder for UpdateQueryBuilder {
    fn query_runner_slot(&mut self) -> &mut Option<Arc<dyn QueryRunner>> {
        &mut self.runner
    }

    fn build_statement(&self) -> Result<(Statement, IndexMap<String, Value>)> {
        let (update, params) = self.build_update()?;
        Ok((update.into(), params))
    }
}

impl std::fmt::Debug for UpdateQueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateQueryBuilder")
            .field("map", &self.map)
            .field("values", &self.values)
            .field("bound_runner", &self.runner.is_some())
            .finish()
    }
}
