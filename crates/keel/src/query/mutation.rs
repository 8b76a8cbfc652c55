//! Pieces shared by the INSERT, UPDATE and DELETE builders.

use super::{AliasKind, AliasTarget, ExpressionMap};
use crate::{Db, Result};

use keel_core::{
    schema::{EntityMetadata, TablePath},
    stmt::Row,
    Error, Registry,
};
use keel_sql::stmt::Returning;

/// Makes `target` the statement's main alias. Entities are aliased by
/// their name unless `alias` is given.
pub(crate) fn bind_target(db: &Db, map: &mut ExpressionMap, target: &str, alias: Option<&str>) {
    let (name, target) = match db.registry().get(target) {
        Some(entity) => (
            alias.unwrap_or(&entity.name).to_string(),
            AliasTarget::Entity(entity.id),
        ),
        None => {
            let path = TablePath::parse(target);
            let name = alias.map_or_else(|| path.table.clone(), str::to_string);
            (name, AliasTarget::Table(path))
        }
    };

    map.create_alias(AliasKind::From, name.clone(), target);
    map.main_alias = Some(name);
}

/// Table written by the statement.
pub(crate) fn target_table(registry: &Registry, map: &ExpressionMap) -> Result<TablePath> {
    let alias = map.main_alias()?;
    match &alias.target {
        AliasTarget::Entity(id) => Ok(registry.entity(*id).table.clone()),
        AliasTarget::Table(path) => Ok(path.clone()),
        AliasTarget::Subquery(_) => Err(Error::unsupported_feature(format!(
            "cannot write to the sub-query {}",
            alias.name
        ))),
    }
}

/// Fails when relation conditions added joins; data-modifying statements
/// have no JOIN clause.
pub(crate) fn reject_joins(map: &ExpressionMap, statement: &str) -> Result<()> {
    if map.has_joins() {
        return Err(Error::unsupported_feature(format!(
            "{statement} cannot filter on joined relations"
        )));
    }
    Ok(())
}

/// The caller's returning list with property paths mapped to column names.
pub(crate) fn requested_returning(
    map: &ExpressionMap,
    metadata: Option<&EntityMetadata>,
) -> Option<Returning> {
    match &map.returning {
        Some(Returning::Columns(columns)) => Some(Returning::Columns(
            columns
                .iter()
                .map(|name| {
                    metadata
                        .and_then(|m| m.find_column_with_property_path(name))
                        .map_or_else(|| name.clone(), |column| column.database_name.clone())
                })
                .collect(),
        )),
        other => other.clone(),
    }
}

/// A returned row keyed by property path instead of column name.
pub(crate) fn generated_map(metadata: Option<&EntityMetadata>, row: &Row) -> Row {
    row.iter()
        .map(|(name, value)| {
            let key = metadata
                .and_then(|m| m.find_column_with_database_name(name))
                .map_or(name, |column| column.property_path.as_str());
            (key.to_string(), value.clone())
        })
        .collect()
}

/// Setters for the returning list shared by the data-modifying builders.
macro_rules! returning_methods {
    () => {
        /// Returns `columns` (property paths or column names) from the
        /// written rows.
        pub fn returning<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
            self.map.returning = Some(keel_sql::stmt::Returning::Columns(
                columns.into_iter().map(Into::into).collect(),
            ));
            self
        }

        /// Returning clause written as is, e.g. `*`.
        pub fn returning_raw(mut self, sql: &str) -> Self {
            self.map.returning = Some(keel_sql::stmt::Returning::Raw(sql.to_string()));
            self
        }
    };
}

pub(crate) use returning_methods;
