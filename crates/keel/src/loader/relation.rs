use super::{distinct_keys, owner_condition};
use crate::{
    hydrate::Entity,
    query::{referenced, EntityRef, QueryBuilder, WhereExpressionBuilder},
    Db, Result,
};

use keel_core::{
    driver::QueryRunner,
    schema::{Column, Relation},
    stmt::Value,
    Error, Registry,
};

use std::sync::Arc;

/// Loads the entities `relation` points at from each of `owners`.
///
/// The target is selected under the relation's property name. A to-one
/// relation whose owner holds the join columns joins the owner table; a
/// many-to-many relation joins its junction; otherwise the target's own
/// join columns are matched.
pub(crate) async fn load_related(
    db: &Db,
    runner: Option<&Arc<dyn QueryRunner>>,
    relation: &Relation,
    owners: &[EntityRef],
) -> Result<Vec<Entity>> {
    let registry: &Registry = db.registry();
    let owner = registry.entity(relation.id.entity);
    let target = registry.target(relation);
    let alias = relation.property_name.as_str();

    let mut qb = db.select(&target.name, alias);
    if let Some(runner) = runner {
        qb = qb.set_query_runner(runner.clone());
    }

    let qb = if relation.is_with_join_column() {
        let owner_alias = if owner.name == alias {
            format!("{}_owner", owner.name)
        } else {
            owner.name.clone()
        };

        let mut on = vec![];
        for column in relation.join_columns.iter().map(|id| registry.column(*id)) {
            on.push(format!(
                "{owner_alias}.{} = {alias}.{}",
                column.database_name,
                referenced(registry, column)?.database_name
            ));
        }

        let primary: Vec<&Column> = owner.primary_columns().collect();
        let keys = owner_keys(owners, primary.iter().map(|pk| pk.property_path.as_str()))?;
        let columns: Vec<&str> = primary.iter().map(|pk| pk.database_name.as_str()).collect();
        let (condition, params) = owner_condition(&owner_alias, &columns, &keys);

        qb.inner_join_on(&owner.name, &owner_alias, &on.join(" AND "))
            .where_(condition)
            .set_parameters(params)
    } else if relation.is_many_to_many() {
        let junction = registry.entity(relation.junction.ok_or_else(|| {
            keel_core::err!("relation {} has no junction", relation.property_path)
        })?);
        let junction_alias = format!("{alias}_junction");

        let mut on = vec![];
        for column in relation.inverse_join_columns.iter().map(|id| registry.column(*id)) {
            on.push(format!(
                "{junction_alias}.{} = {alias}.{}",
                column.database_name,
                referenced(registry, column)?.database_name
            ));
        }

        let join_columns: Vec<&Column> = relation
            .join_columns
            .iter()
            .map(|id| registry.column(*id))
            .collect();
        let keys = owner_keys(owners, referenced_properties(registry, &join_columns)?)?;
        let columns: Vec<&str> = join_columns.iter().map(|c| c.database_name.as_str()).collect();
        let (condition, params) = owner_condition(&junction_alias, &columns, &keys);

        qb.inner_join_on(&junction.name, &junction_alias, &on.join(" AND "))
            .where_(condition)
            .set_parameters(params)
    } else {
        let inverse = registry
            .inverse(relation)
            .ok_or_else(|| Error::relation_not_found(&owner.name, &relation.property_path))?;

        let join_columns: Vec<&Column> = inverse
            .join_columns
            .iter()
            .map(|id| registry.column(*id))
            .collect();
        let keys = owner_keys(owners, referenced_properties(registry, &join_columns)?)?;
        let columns: Vec<&str> = join_columns.iter().map(|c| c.database_name.as_str()).collect();
        let (condition, params) = owner_condition(alias, &columns, &keys);

        qb.where_(condition).set_parameters(params)
    };

    qb.get_many().await
}

fn referenced_properties<'a>(
    registry: &'a Registry,
    columns: &[&Column],
) -> Result<Vec<&'a str>> {
    columns
        .iter()
        .map(|column| Ok(referenced(registry, column)?.property_path.as_str()))
        .collect()
}

/// The values of `properties` on each owner.
fn owner_keys<'a>(
    owners: &[EntityRef],
    properties: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Vec<Value>>> {
    let properties: Vec<&str> = properties.into_iter().collect();
    let mut keys = vec![];

    for owner in owners {
        let mut key = vec![];
        for property in &properties {
            let value = owner
                .property(property)
                .cloned()
                .ok_or_else(|| Error::entity_column_not_found(*property))?;
            key.push(value);
        }
        keys.push(key);
    }

    Ok(distinct_keys(keys))
}
