use super::{distinct_keys, owner_condition};
use crate::{
    query::{
        build_alias, referenced, ExpressionMap, QueryBuilder, RelationCountAttribute,
        WhereExpressionBuilder,
    },
    Db, Result,
};

use keel_core::{
    driver::QueryRunner,
    schema::{Column, Relation},
    stmt::{Row, Value},
    Error, Registry,
};

use std::sync::Arc;
use tracing::debug;

/// Counts loaded for one `load_relation_count_and_map` request.
#[derive(Debug)]
pub(crate) struct RelationCounts {
    pub(crate) attribute: RelationCountAttribute,

    /// Column of the parent alias the counts are keyed by.
    pub(crate) owner_column: String,

    pub(crate) counts: Vec<(Value, i64)>,
}

pub(crate) async fn load_relation_counts(
    db: &Db,
    runner: &Arc<dyn QueryRunner>,
    map: &ExpressionMap,
    rows: &[Row],
) -> Result<Vec<RelationCounts>> {
    let mut loaded = vec![];
    for attribute in &map.relation_counts {
        loaded.push(load(db, runner, attribute, rows).await?);
    }
    Ok(loaded)
}

async fn load(
    db: &Db,
    runner: &Arc<dyn QueryRunner>,
    attribute: &RelationCountAttribute,
    rows: &[Row],
) -> Result<RelationCounts> {
    let registry: &Registry = db.registry();
    let relation = registry.relation(attribute.relation);
    let owner_name = &registry.entity(attribute.relation.entity).name;

    let (source, alias, column) = if relation.is_many_to_many() {
        let junction = relation.junction.ok_or_else(|| {
            keel_core::err!("relation {} has no junction", relation.property_path)
        })?;
        (
            registry.entity(junction),
            attribute.junction_alias(registry),
            single_join_column(registry, relation, &relation.join_columns)?,
        )
    } else if relation.is_one_to_many() || relation.is_one_to_one_not_owner() {
        let inverse = registry
            .inverse(relation)
            .ok_or_else(|| Error::relation_not_found(owner_name, &relation.property_path))?;
        let target = registry.target(relation);
        let alias = attribute
            .alias
            .clone()
            .unwrap_or_else(|| format!("{}_{}_rc", attribute.parent_alias, target.name));
        (
            target,
            alias,
            single_join_column(registry, relation, &inverse.join_columns)?,
        )
    } else {
        return Err(Error::unsupported_feature(format!(
            "relation counts need a to-many relation; {owner_name}.{} is not one",
            relation.property_path
        )));
    };

    let owner_column = referenced(registry, column)?.database_name.clone();
    let parent_key = build_alias(
        db.max_alias_length(),
        &[&attribute.parent_alias, &owner_column],
    );
    let keys = distinct_keys(
        rows.iter()
            .map(|row| vec![row.get_or_null(&parent_key).clone()]),
    );

    if keys.is_empty() {
        return Ok(RelationCounts {
            attribute: attribute.clone(),
            owner_column,
            counts: vec![],
        });
    }

    let grouped = format!("{alias}.{}", column.database_name);
    let (condition, params) = owner_condition(&alias, &[column.database_name.as_str()], &keys);

    debug!(
        target: "keel::query",
        relation = relation.property_path.as_str(),
        owners = keys.len(),
        "loading relation counts"
    );

    let found = db
        .create_query_builder()
        .set_query_runner(runner.clone())
        .from(&source.name, &alias)
        .clear_order_by()
        .select_as(&grouped, "parentId")
        .add_select_as("COUNT(*)", "cnt")
        .where_(condition)
        .set_parameters(params)
        .group_by(&grouped)
        .get_raw_many()
        .await?;

    let counts = found
        .iter()
        .map(|row| {
            (
                row.get_or_null("parentId").clone(),
                row.get("cnt").and_then(Value::as_i64).unwrap_or(0),
            )
        })
        .collect();

    Ok(RelationCounts {
        attribute: attribute.clone(),
        owner_column,
        counts,
    })
}

fn single_join_column<'a>(
    registry: &'a Registry,
    relation: &Relation,
    columns: &[keel_core::schema::ColumnId],
) -> Result<&'a Column> {
    match columns {
        [id] => Ok(registry.column(*id)),
        _ => Err(Error::unsupported_feature(format!(
            "relation counts need a single join column; {} has {}",
            relation.property_path,
            columns.len()
        ))),
    }
}
