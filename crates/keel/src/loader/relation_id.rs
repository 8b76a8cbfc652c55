use super::{distinct_keys, owner_condition};
use crate::{
    query::{
        build_alias, referenced, ExpressionMap, QueryBuilder, RelationIdAttribute,
        WhereExpressionBuilder,
    },
    Db, Result,
};

use keel_core::{
    driver::QueryRunner,
    stmt::{Row, Value},
    Error, Registry,
};

use std::sync::Arc;
use tracing::debug;

/// Ids loaded for one `load_relation_id_and_map` request.
#[derive(Debug)]
pub(crate) struct RelationIds {
    pub(crate) attribute: RelationIdAttribute,

    /// Columns of the parent alias the owner keys are matched against.
    pub(crate) owner_columns: Vec<String>,

    pub(crate) rows: Vec<RelationIdRow>,
}

#[derive(Debug)]
pub(crate) struct RelationIdRow {
    /// Parent key, in `owner_columns` order.
    pub(crate) owner: Vec<Value>,

    /// Id of the related entity, by property path.
    pub(crate) id: Row,
}

pub(crate) async fn load_relation_ids(
    db: &Db,
    runner: &Arc<dyn QueryRunner>,
    map: &ExpressionMap,
    rows: &[Row],
) -> Result<Vec<RelationIds>> {
    let mut loaded = vec![];
    for attribute in &map.relation_ids {
        loaded.push(load(db, runner, attribute, rows).await?);
    }
    Ok(loaded)
}

async fn load(
    db: &Db,
    runner: &Arc<dyn QueryRunner>,
    attribute: &RelationIdAttribute,
    rows: &[Row],
) -> Result<RelationIds> {
    let registry: &Registry = db.registry();
    let relation = registry.relation(attribute.relation);
    let max = db.max_alias_length();
    let parent = attribute.parent_alias.as_str();

    let read_keys = |columns: &[String]| {
        distinct_keys(rows.iter().map(|row| {
            columns
                .iter()
                .map(|column| row.get_or_null(&build_alias(max, &[parent, column])).clone())
                .collect()
        }))
    };

    // The parent row holds the join columns: the ids are already there.
    if relation.is_with_join_column() {
        let join_columns: Vec<_> = relation
            .join_columns
            .iter()
            .map(|id| registry.column(*id))
            .collect();
        let owner_columns: Vec<String> = join_columns
            .iter()
            .map(|column| column.database_name.clone())
            .collect();

        let mut id_rows = vec![];
        for key in read_keys(&owner_columns) {
            let mut id = Row::new();
            for (column, value) in join_columns.iter().zip(&key) {
                id.insert(
                    referenced(registry, column)?.property_path.clone(),
                    value.clone(),
                );
            }
            id_rows.push(RelationIdRow { owner: key, id });
        }

        return Ok(RelationIds {
            attribute: attribute.clone(),
            owner_columns,
            rows: id_rows,
        });
    }

    // Otherwise query the junction (many-to-many) or the target table:
    // (column read, parent column it matches) and (column read, id property).
    let (source, alias, owner_side, id_side) = if relation.is_many_to_many() {
        let junction = relation.junction.ok_or_else(|| {
            keel_core::err!("relation {} has no junction", relation.property_path)
        })?;

        let mut owner_side = vec![];
        for column in relation.join_columns.iter().map(|id| registry.column(*id)) {
            owner_side.push((
                column.database_name.clone(),
                referenced(registry, column)?.database_name.clone(),
            ));
        }

        let mut id_side = vec![];
        for column in relation.inverse_join_columns.iter().map(|id| registry.column(*id)) {
            id_side.push((
                column.database_name.clone(),
                referenced(registry, column)?.property_path.clone(),
            ));
        }

        (
            registry.entity(junction),
            attribute.junction_alias(registry),
            owner_side,
            id_side,
        )
    } else {
        let inverse = registry.inverse(relation).ok_or_else(|| {
            Error::relation_not_found(
                &registry.entity(attribute.relation.entity).name,
                &relation.property_path,
            )
        })?;
        let target = registry.target(relation);

        let mut owner_side = vec![];
        for column in inverse.join_columns.iter().map(|id| registry.column(*id)) {
            owner_side.push((
                column.database_name.clone(),
                referenced(registry, column)?.database_name.clone(),
            ));
        }

        let id_side = target
            .primary_columns()
            .map(|pk| (pk.database_name.clone(), pk.property_path.clone()))
            .collect();

        let alias = attribute
            .alias
            .clone()
            .unwrap_or_else(|| format!("{parent}_{}_rid", target.name));

        (target, alias, owner_side, id_side)
    };

    let owner_columns: Vec<String> = owner_side.iter().map(|(_, parent)| parent.clone()).collect();
    let keys = read_keys(&owner_columns);

    if keys.is_empty() {
        return Ok(RelationIds {
            attribute: attribute.clone(),
            owner_columns,
            rows: vec![],
        });
    }

    let read: Vec<&str> = owner_side.iter().map(|(column, _)| column.as_str()).collect();
    let (condition, params) = owner_condition(&alias, &read, &keys);

    let mut qb = db
        .create_query_builder()
        .set_query_runner(runner.clone())
        .from(&source.name, &alias)
        .clear_order_by();
    for (i, (column, _)) in owner_side.iter().enumerate() {
        qb = qb.add_select_as(&format!("{alias}.{column}"), &format!("owner_{i}"));
    }
    for (j, (column, _)) in id_side.iter().enumerate() {
        qb = qb.add_select_as(&format!("{alias}.{column}"), &format!("id_{j}"));
    }

    debug!(
        target: "keel::query",
        relation = relation.property_path.as_str(),
        owners = keys.len(),
        "loading relation ids"
    );

    let found = qb.where_(condition).set_parameters(params).get_raw_many().await?;

    let rows = found
        .iter()
        .map(|row| RelationIdRow {
            owner: (0..owner_side.len())
                .map(|i| row.get_or_null(&format!("owner_{i}")).clone())
                .collect(),
            id: id_side
                .iter()
                .enumerate()
                .map(|(j, (_, property))| (property.clone(), row.get_or_null(&format!("id_{j}")).clone()))
                .collect(),
        })
        .collect();

    Ok(RelationIds {
        attribute: attribute.clone(),
        owner_columns,
        rows,
    })
}
