use super::{columns, key_of, Link};
use crate::{
    query::{referenced, EntityRef, ValueSet, WhereExpressionBuilder},
    Result, Where,
};

use keel_core::{
    schema::{Column, Relation},
    stmt::Value,
    Error, Registry,
};

use tracing::debug;

/// Points the to-one `relation` of each of `of` at `value`, or clears it.
pub(crate) async fn set(
    link: &Link<'_>,
    relation: &Relation,
    of: &[EntityRef],
    value: Option<&EntityRef>,
) -> Result<()> {
    let registry = link.registry();
    let owner = registry.entity(relation.id.entity);

    if relation.is_to_many() {
        return Err(Error::unsupported_feature(format!(
            "{}.{} is a to-many relation; use add and remove",
            owner.name, relation.property_path
        )));
    }
    if of.is_empty() {
        return Ok(());
    }

    if relation.is_with_join_column() {
        let join_columns = columns(registry, &relation.join_columns);
        let key = value
            .map(|value| key_of(registry, &join_columns, value))
            .transpose()?;
        let values = join_values(registry, &relation.property_path, &join_columns, key.as_deref())?;

        debug!(target: "keel::relation", relation = %relation.property_path, owners = of.len(), "setting foreign key");
        link.bind(link.db.update(&owner.name).set(values).where_in_ids(of))
            .execute()
            .await?;
        return Ok(());
    }

    // Inverse side of a one-to-one: the foreign key lives on the target.
    let inverse = registry
        .inverse(relation)
        .ok_or_else(|| Error::relation_not_found(&owner.name, &relation.property_path))?;
    let target = registry.target(relation);
    let [of] = of else {
        return Err(Error::invalid_parameter(
            "of",
            "the inverse side of a one-to-one relation is set for one entity at a time",
        ));
    };

    let join_columns = columns(registry, &inverse.join_columns);
    let owner_key = key_of(registry, &join_columns, of)?;

    let update = link.db.update(&target.name);
    let update = match value {
        Some(value) => update
            .set(join_values(registry, &inverse.property_path, &join_columns, Some(&owner_key))?)
            .where_in_ids([value]),
        None => update
            .set(join_values(registry, &inverse.property_path, &join_columns, None)?)
            .where_(pointing_at(registry, &inverse.property_path, &join_columns, &owner_key)?),
    };

    link.bind(update).execute().await?;
    Ok(())
}

/// Links each of `values` to the owners in `of`. Many-to-many relations get
/// one junction row per pair; one-to-many relations point the children's
/// foreign key at their single owner.
pub(crate) async fn add(
    link: &Link<'_>,
    relation: &Relation,
    of: &[EntityRef],
    values: &[EntityRef],
) -> Result<()> {
    let registry = link.registry();
    let owner = registry.entity(relation.id.entity);

    if of.is_empty() || values.is_empty() {
        return Ok(());
    }

    if relation.is_many_to_many() {
        let junction = registry.entity(relation.junction.ok_or_else(|| {
            keel_core::err!("relation {} has no junction", relation.property_path)
        })?);
        let owner_columns = columns(registry, &relation.join_columns);
        let target_columns = columns(registry, &relation.inverse_join_columns);

        let mut rows = vec![];
        for owner_ref in of {
            let owner_key = key_of(registry, &owner_columns, owner_ref)?;
            for value in values {
                let target_key = key_of(registry, &target_columns, value)?;

                let mut row = ValueSet::new();
                for (column, value) in owner_columns.iter().zip(&owner_key) {
                    row = row.set(column.property_path.clone(), value.clone());
                }
                for (column, value) in target_columns.iter().zip(&target_key) {
                    row = row.set(column.property_path.clone(), value.clone());
                }
                rows.push(row);
            }
        }

        debug!(target: "keel::relation", junction = %junction.name, rows = rows.len(), "adding junction rows");
        link.bind_insert(link.db.insert().into(&junction.name).values(rows))
            .execute()
            .await?;
        return Ok(());
    }

    if !relation.is_one_to_many() {
        return Err(Error::unsupported_feature(format!(
            "{}.{} is a to-one relation; use set",
            owner.name, relation.property_path
        )));
    }

    let [of] = of else {
        return Err(Error::invalid_parameter(
            "of",
            "one-to-many relations are added to one entity at a time",
        ));
    };
    let inverse = registry
        .inverse(relation)
        .ok_or_else(|| Error::relation_not_found(&owner.name, &relation.property_path))?;
    let target = registry.target(relation);
    let join_columns = columns(registry, &inverse.join_columns);
    let owner_key = key_of(registry, &join_columns, of)?;

    let update = link
        .db
        .update(&target.name)
        .set(join_values(registry, &inverse.property_path, &join_columns, Some(&owner_key))?)
        .where_in_ids(values);
    link.bind(update).execute().await?;
    Ok(())
}

/// `relation.referencedProperty = key` (or NULL) for each join column.
pub(super) fn join_values(
    registry: &Registry,
    relation_path: &str,
    join_columns: &[&Column],
    key: Option<&[Value]>,
) -> Result<ValueSet> {
    let mut values = ValueSet::new();
    for (i, column) in join_columns.iter().enumerate() {
        let path = format!(
            "{relation_path}.{}",
            referenced(registry, column)?.property_path
        );
        let value = key.map_or(Value::Null, |key| key[i].clone());
        values = values.set(path, value);
    }
    Ok(values)
}

/// Matches rows whose `relation_path` foreign key equals `key`.
pub(super) fn pointing_at(
    registry: &Registry,
    relation_path: &str,
    join_columns: &[&Column],
    key: &[Value],
) -> Result<Where> {
    let mut nested = Where::new();
    for (column, value) in join_columns.iter().zip(key) {
        nested = nested.set(referenced(registry, column)?.property_path.clone(), value.clone());
    }
    Ok(Where::new().set(relation_path, nested))
}
