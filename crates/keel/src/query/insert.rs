use super::{mutation, raw, ExpressionMap, QueryType, Session};
use crate::{hydrate::Entity, Db, Result};

use keel_core::{
    driver::{InsertIdSemantics, QueryResult, QueryRunner},
    schema::{Column, EntityMetadata, Generation},
    stmt::{Row, Value},
    Error, Registry,
};
use keel_sql::{
    stmt::{Expr, Insert, OnConflict},
    Statement,
};

use indexmap::IndexMap;
use std::sync::Arc;

/// One value of an inserted row.
#[derive(Clone)]
pub enum InsertValue {
    Value(Value),

    /// SQL produced when the statement is built and written as is.
    Raw(Arc<dyn Fn() -> String + Send + Sync>),

    /// The column default.
    Default,
}

impl InsertValue {
    pub fn raw(f: impl Fn() -> String + Send + Sync + 'static) -> InsertValue {
        InsertValue::Raw(Arc::new(f))
    }
}

impl std::fmt::Debug for InsertValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            InsertValue::Raw(_) => f.write_str("Raw(..)"),
            InsertValue::Default => f.write_str("Default"),
        }
    }
}

macro_rules! impl_insert_value_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for InsertValue {
                fn from(src: $ty) -> InsertValue {
                    InsertValue::Value(src.into())
                }
            }
        )*
    };
}

impl_insert_value_from_value!(Value, bool, i32, i64, u32, f64, &str, String, uuid::Uuid, serde_json::Value);

impl<T: Into<Value>> From<Option<T>> for InsertValue {
    fn from(src: Option<T>) -> InsertValue {
        InsertValue::Value(src.into())
    }
}

/// Values of one row keyed by property path. Relations are set through
/// their join columns, either as `author` (single-column keys) or
/// `author.id`.
#[derive(Debug, Clone, Default)]
pub struct ValueSet(IndexMap<String, InsertValue>);

impl ValueSet {
    pub fn new() -> ValueSet {
        ValueSet::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<InsertValue>) -> ValueSet {
        self.0.insert(path.into(), value.into());
        self
    }

    pub fn get(&self, path: &str) -> Option<&InsertValue> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InsertValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Row> for ValueSet {
    fn from(src: Row) -> ValueSet {
        ValueSet(
            src.into_iter()
                .map(|(k, v)| (k, InsertValue::Value(v)))
                .collect(),
        )
    }
}

impl From<&Entity> for ValueSet {
    fn from(src: &Entity) -> ValueSet {
        src.to_row().into()
    }
}

impl From<Entity> for ValueSet {
    fn from(src: Entity) -> ValueSet {
        (&src).into()
    }
}

/// What an INSERT returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    /// Primary key of each inserted row, keyed by property path, when it is
    /// known.
    pub identifiers: Vec<Row>,

    /// Values generated for each row: by the database (read back through
    /// `RETURNING` or the insert id) or on the client (UUIDs, versions).
    pub generated_maps: Vec<Row>,

    pub raw: Vec<Row>,
    pub affected: Option<u64>,
}

/// Builds and runs INSERT statements.
#[derive(Clone)]
pub struct InsertQueryBuilder {
    db: Db,
    map: ExpressionMap,
    runner: Option<Arc<dyn QueryRunner>>,
    rows: Vec<ValueSet>,
    or_ignore: bool,

    /// Upsert: property paths to overwrite and the conflict target.
    on_conflict: Option<(Vec<String>, Vec<String>)>,
}

/// A built statement plus the values generated on the client, per row.
struct Built {
    insert: Insert,
    params: IndexMap<String, Value>,
    generated: Vec<Row>,
}

impl InsertQueryBuilder {
    pub(crate) fn new(db: Db) -> InsertQueryBuilder {
        InsertQueryBuilder {
            db,
            map: ExpressionMap::new(QueryType::Insert),
            runner: None,
            rows: vec![],
            or_ignore: false,
            on_conflict: None,
        }
    }

    /// Inserts into entity (or table) `target`.
    pub fn into(mut self, target: &str) -> Self {
        mutation::bind_target(&self.db, &mut self.map, target, None);
        self
    }

    /// Replaces the rows to insert.
    pub fn values<V: Into<ValueSet>>(mut self, rows: impl IntoIterator<Item = V>) -> Self {
        self.rows = rows.into_iter().map(Into::into).collect();
        self
    }

    pub fn value(mut self, row: impl Into<ValueSet>) -> Self {
        self.rows = vec![row.into()];
        self
    }

    /// Skips rows that collide with an existing key.
    pub fn or_ignore(mut self) -> Self {
        self.or_ignore = true;
        self
    }

    /// Overwrites `overwrite` when a row collides on `conflict_target`.
    pub fn or_update<S: Into<String>, T: Into<String>>(
        mut self,
        overwrite: impl IntoIterator<Item = S>,
        conflict_target: impl IntoIterator<Item = T>,
    ) -> Self {
        self.on_conflict = Some((
            overwrite.into_iter().map(Into::into).collect(),
            conflict_target.into_iter().map(Into::into).collect(),
        ));
        self
    }

    mutation::returning_methods!();

    /// Reads generated values back after the insert. On by default.
    pub fn update_entity(mut self, enabled: bool) -> Self {
        self.map.update_entity = enabled;
        self
    }

    pub fn set_query_runner(mut self, runner: Arc<dyn QueryRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn use_transaction(mut self, enabled: bool) -> Self {
        self.map.use_transaction = enabled;
        self
    }

    pub fn set_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let Err(err) = self.map.set_parameter(name, value.into()) {
            self.map.fail(err);
        }
        self
    }

    /// SQL text with named parameters left as `:name`.
    pub fn get_query(&self) -> Result<String> {
        let built = self.build()?;
        self.db
            .serializer()
            .serialize_unbound(&Statement::from(built.insert))
    }

    pub fn get_query_and_parameters(&self) -> Result<(String, Vec<Value>)> {
        let built = self.build()?;
        let mut bound = vec![];
        let sql = self.db.serializer().serialize(
            &Statement::from(built.insert),
            &built.params,
            &mut bound,
        )?;
        Ok((sql, bound))
    }

    pub fn get_sql(&self) -> Result<String> {
        Ok(self.get_query_and_parameters()?.0)
    }

    pub fn expression_map(&self) -> &ExpressionMap {
        &self.map
    }

    pub async fn execute(&self) -> Result<InsertResult> {
        let Built {
            insert,
            params,
            generated,
        } = self.build()?;
        let returning = insert.returning.is_some();

        let result = Session::run(
            &self.db,
            self.runner.as_ref(),
            self.map.use_transaction,
            &Statement::from(insert),
            &params,
        )
        .await?;

        Ok(self.insert_result(result, returning, generated))
    }

    fn build(&self) -> Result<Built> {
        self.map.check()?;
        if self.rows.is_empty() {
            return Err(Error::invalid_parameter(
                "values",
                "nothing to insert; call values() first",
            ));
        }

        let registry: &Registry = self.db.registry();
        let mut map = self.map.clone();
        let mut insert = Insert::new(mutation::target_table(registry, &map)?);
        insert.or_ignore = self.or_ignore;

        let metadata = map.main_alias()?.metadata(registry);
        let mut generated = vec![Row::new(); self.rows.len()];

        match metadata {
            Some(metadata) => {
                self.check_paths(registry, metadata)?;

                let columns = self.inserted_columns(registry, metadata);
                insert.columns = columns.iter().map(|c| c.database_name.clone()).collect();

                for (set, generated) in self.rows.iter().zip(&mut generated) {
                    let mut values = vec![];
                    for column in &columns {
                        let value = lookup(registry, column, set);
                        values.push(self.column_value(&mut map, metadata, column, value, generated));
                    }
                    insert.values.push(values);
                }
            }
            None => {
                let mut columns: Vec<String> = vec![];
                for set in &self.rows {
                    for key in set.keys() {
                        if !columns.iter().any(|c| c == key) {
                            columns.push(key.to_string());
                        }
                    }
                }

                for set in &self.rows {
                    let values = columns
                        .iter()
                        .map(|column| match set.get(column) {
                            Some(value) => self.expr(&mut map, value, None),
                            None => self.missing(None),
                        })
                        .collect();
                    insert.values.push(values);
                }
                insert.columns = columns;
            }
        }

        if let Some((overwrite, conflict_target)) = &self.on_conflict {
            let physical = |paths: &[String]| {
                paths
                    .iter()
                    .map(|path| {
                        metadata
                            .and_then(|m| m.find_column_with_property_path(path))
                            .map_or_else(|| path.clone(), |c| c.database_name.clone())
                    })
                    .collect()
            };
            insert.on_conflict = Some(OnConflict {
                overwrite: physical(overwrite),
                conflict_target: physical(conflict_target),
            });
        }

        insert.returning = self.build_returning(metadata);

        Ok(Built {
            insert,
            params: map.parameters,
            generated,
        })
    }

    /// Every key of every row must name a column or relation.
    fn check_paths(&self, registry: &Registry, metadata: &EntityMetadata) -> Result<()> {
        for set in &self.rows {
            for key in set.keys() {
                if raw::resolve_path(registry, metadata, key).is_none()
                    && !metadata.has_relation_with_property_path(key)
                {
                    return Err(Error::entity_column_not_found(format!(
                        "{}.{key}",
                        metadata.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Columns written by the statement. Database-generated keys are left
    /// out unless some row provides one.
    fn inserted_columns<'a>(
        &self,
        registry: &Registry,
        metadata: &'a EntityMetadata,
    ) -> Vec<&'a Column> {
        metadata
            .columns
            .iter()
            .filter(|column| {
                if column.is_version() || column.is_discriminator() {
                    return true;
                }
                if !column.insert {
                    return false;
                }

                let provided = self
                    .rows
                    .iter()
                    .any(|set| lookup(registry, column, set).is_some());

                match column.generated {
                    Some(Generation::Increment | Generation::Rowid) => provided,
                    _ if column.is_create_date() || column.is_update_date() => provided,
                    _ => true,
                }
            })
            .collect()
    }

    fn column_value(
        &self,
        map: &mut ExpressionMap,
        metadata: &EntityMetadata,
        column: &Column,
        value: Option<&InsertValue>,
        generated: &mut Row,
    ) -> Expr {
        if let Some(value @ (InsertValue::Value(_) | InsertValue::Raw(_))) = value {
            return self.expr(map, value, Some(column));
        }

        if column.is_version() {
            generated.insert(column.property_path.clone(), 1);
            return Expr::Param(map.create_parameter(Value::I64(1)));
        }

        if column.is_discriminator() {
            let value = metadata
                .discriminator_value
                .clone()
                .unwrap_or_else(|| metadata.name.clone());
            return Expr::Param(map.create_parameter(Value::from(value)));
        }

        if column.generated == Some(Generation::Uuid) && !self.db.capability().uuid_generation {
            let id = Value::Uuid(uuid::Uuid::new_v4());
            generated.insert(column.property_path.clone(), id.clone());
            return Expr::Param(map.create_parameter(id));
        }

        self.missing(Some(column))
    }

    fn expr(&self, map: &mut ExpressionMap, value: &InsertValue, column: Option<&Column>) -> Expr {
        match value {
            InsertValue::Value(value) => Expr::Param(map.create_parameter(value.clone())),
            InsertValue::Raw(f) => Expr::raw(f()),
            InsertValue::Default => self.missing(column),
        }
    }

    /// `DEFAULT` where the keyword is accepted in a VALUES list, otherwise
    /// the column's default expression or `NULL`.
    fn missing(&self, column: Option<&Column>) -> Expr {
        if self.db.capability().insert_default_keyword {
            return Expr::Default;
        }

        match column.and_then(|c| c.default.as_deref()) {
            Some(default) => Expr::raw(default),
            None => Expr::raw("NULL"),
        }
    }

    /// The caller's returning list, or the database-generated columns when
    /// the entity is to be updated and the database can return rows.
    fn build_returning(&self, metadata: Option<&EntityMetadata>) -> Option<keel_sql::stmt::Returning> {
        if let Some(requested) = mutation::requested_returning(&self.map, metadata) {
            return Some(requested);
        }

        let metadata = metadata?;
        let capability = self.db.capability();
        if !self.map.update_entity || !capability.is_returning_supported() {
            return None;
        }

        let columns: Vec<String> = metadata
            .columns
            .iter()
            .filter(|column| !column.is_virtual)
            .filter(|column| match column.generated {
                Some(Generation::Uuid) => capability.uuid_generation,
                Some(_) => true,
                None => {
                    column.is_create_date() || column.is_update_date() || column.default.is_some()
                }
            })
            .map(|column| column.database_name.clone())
            .collect();

        (!columns.is_empty()).then_some(keel_sql::stmt::Returning::Columns(columns))
    }

    fn insert_result(&self, result: QueryResult, returning: bool, mut generated: Vec<Row>) -> InsertResult {
        let registry = self.db.registry();
        let metadata = self
            .map
            .main_alias()
            .ok()
            .and_then(|alias| alias.metadata(registry));

        if returning {
            for (generated, record) in generated.iter_mut().zip(&result.records) {
                for (key, value) in mutation::generated_map(metadata, record) {
                    generated.insert(key, value);
                }
            }
        } else if let (Some(metadata), Some(insert_id)) = (metadata, &result.insert_id) {
            self.map_insert_id(metadata, insert_id, &mut generated);
        }

        let identifiers = match metadata {
            Some(metadata) => self.identifiers(registry, metadata, &generated),
            None => vec![],
        };

        InsertResult {
            identifiers,
            generated_maps: generated,
            raw: result.records,
            affected: result.affected,
        }
    }

    /// Spreads the driver's insert id over the rows: MySQL reports the first
    /// generated id of a multi-row insert, SQLite the last.
    fn map_insert_id(&self, metadata: &EntityMetadata, insert_id: &Value, generated: &mut [Row]) {
        let registry = self.db.registry();
        let mut primary = metadata.primary_columns();
        let (Some(pk), None) = (primary.next(), primary.next()) else {
            return;
        };

        if !matches!(pk.generated, Some(Generation::Increment | Generation::Rowid))
            || self.rows.iter().any(|set| lookup(registry, pk, set).is_some())
        {
            return;
        }

        let Some(id) = insert_id.as_i64() else {
            return;
        };

        let count = generated.len() as i64;
        let first = match self.db.capability().insert_id {
            InsertIdSemantics::First => id,
            InsertIdSemantics::Last => id - (count - 1),
        };

        for (i, row) in generated.iter_mut().enumerate() {
            row.insert(pk.property_path.clone(), first + i as i64);
        }
    }

    fn identifiers(&self, registry: &Registry, metadata: &EntityMetadata, generated: &[Row]) -> Vec<Row> {
        let mut identifiers = vec![];

        for (set, generated) in self.rows.iter().zip(generated) {
            let mut id = Row::new();
            for pk in metadata.primary_columns() {
                let value = match lookup(registry, pk, set) {
                    Some(InsertValue::Value(value)) => Some(value.clone()),
                    _ => generated.get(&pk.property_path).cloned(),
                };
                if let Some(value) = value {
                    id.insert(pk.property_path.clone(), value);
                }
            }
            identifiers.push(id);
        }

        identifiers
    }
}

/// The value `set` provides for `column`: by property path, or for a join
/// column by `relation.referencedProperty` (or the bare relation when it
/// has one join column).
fn lookup<'a>(registry: &Registry, column: &Column, set: &'a ValueSet) -> Option<&'a InsertValue> {
    let Some(relation) = column.relation else {
        return set.get(&column.property_path);
    };

    let relation = registry.relation(relation);
    if let Some(referenced) = column.referenced_column {
        let path = format!(
            "{}.{}",
            relation.property_path,
            registry.column(referenced).property_path
        );
        if let Some(value) = set.get(&path) {
            return Some(value);
        }
    }

    if relation.join_columns.len() == 1 {
        return set.get(&relation.property_path);
    }

    None
}

impl std::fmt::Debug for InsertQueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertQueryBuilder")
            .field("map", &self.map)
            .field("rows", &self.rows)
            .field("bound_runner", &self.runner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        driver::{Capability, QueryResult},
        test_util,
    };
    use pretty_assertions::assert_eq;
    use std_util::prelude::*;

    #[test]
    fn omits_generated_keys_and_starts_versions_at_one() {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        let (sql, params) = assert_ok!(db
            .insert()
            .into("Post")
            .values([ValueSet::new().set("title", "Hello")])
            .get_query_and_parameters());

        assert_eq!(
            sql,
            r#"INSERT INTO "post"("title", "version", "deletedAt") VALUES ($1, $2, DEFAULT) RETURNING "id""#
        );
        assert_eq!(params, vec![Value::from("Hello"), Value::I64(1)]);
    }

    #[test]
    fn sqlite_writes_null_for_missing_values() {
        let (db, _) = test_util::db(&Capability::SQLITE);
        let sql = assert_ok!(db
            .insert()
            .into("Photo")
            .update_entity(false)
            .values([ValueSet::new().set("url", "a.png"), ValueSet::new().set("user", 3)])
            .get_sql());

        assert_eq!(
            sql,
            r#"INSERT INTO "photo"("url", "userId") VALUES (?, NULL), (NULL, ?)"#
        );
    }

    #[test]
    fn unknown_properties_are_rejected() {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        let err = assert_err!(db
            .insert()
            .into("Post")
            .values([ValueSet::new().set("nope", 1)])
            .get_query());
        assert!(err.is_entity_column_not_found());
    }

    #[test]
    fn raw_values_are_written_as_is() {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        let sql = assert_ok!(db
            .insert()
            .into("Tag")
            .update_entity(false)
            .values([ValueSet::new().set("label", InsertValue::raw(|| "lower('X')".to_string()))])
            .get_query());
        assert_eq!(sql, r#"INSERT INTO "tag"("label") VALUES (lower('X'))"#);
    }

    #[test]
    fn upsert_per_dialect() {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        let sql = assert_ok!(db
            .insert()
            .into("Tag")
            .update_entity(false)
            .values([ValueSet::new().set("id", 1).set("label", "a")])
            .or_update(["label"], ["id"])
            .get_query());
        assert_eq!(
            sql,
            r#"INSERT INTO "tag"("id", "label") VALUES (:orm_param_0, :orm_param_1) ON CONFLICT ( "id" ) DO UPDATE SET "label" = EXCLUDED."label""#
        );

        let (db, _) = test_util::db(&Capability::MYSQL);
        let sql = assert_ok!(db
            .insert()
            .into("Tag")
            .values([ValueSet::new().set("id", 1).set("label", "a")])
            .or_update(["label"], ["id"])
            .get_sql());
        assert_eq!(
            sql,
            "INSERT INTO `tag`(`id`, `label`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `label` = VALUES(`label`)"
        );
    }

    #[tokio::test]
    async fn insert_id_is_spread_over_rows() {
        let (db, script) = test_util::db(&Capability::SQLITE);
        script.results.lock().unwrap().push_back(QueryResult {
            insert_id: Some(Value::I64(12)),
            affected: Some(2),
            ..QueryResult::default()
        });

        let result = assert_ok!(
            db.insert()
                .into("Tag")
                .update_entity(false)
                .values([
                    ValueSet::new().set("label", "a"),
                    ValueSet::new().set("label", "b"),
                ])
                .execute()
                .await
        );

        assert_eq!(
            result.identifiers,
            vec![Row::new().with("id", 11), Row::new().with("id", 12)]
        );
        assert_eq!(result.affected, Some(2));
        assert_eq!(script.released.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returned_rows_become_generated_maps() {
        let (db, script) = test_util::db(&Capability::POSTGRESQL);
        script.push_rows(vec![Row::new().with("id", 7)]);

        let result = assert_ok!(
            db.insert()
                .into("Post")
                .value(ValueSet::new().set("title", "Hi"))
                .execute()
                .await
        );

        assert_eq!(
            result.generated_maps,
            vec![Row::new().with("version", 1).with("id", 7)]
        );
        assert_eq!(result.identifiers, vec![Row::new().with("id", 7)]);
    }

    #[test]
    fn requested_returning_replaces_generated_columns() {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        let sql = assert_ok!(db
            .insert()
            .into("Post")
            .values([ValueSet::new().set("title", "Hello")])
            .returning(["title"])
            .get_sql());

        assert!(sql.ends_with(r#" RETURNING "title""#), "{sql}");
    }

    #[test]
    fn returning_requires_support() {
        let (db, _) = test_util::db(&Capability::MYSQL);
        let err = assert_err!(db
            .insert()
            .into("Tag")
            .values([ValueSet::new().set("label", "a")])
            .returning(["id"])
            .get_sql());
        assert!(err.is_unsupported_feature());
    }
}
