use super::{columns, key_of, updater, Link};
use crate::{
    query::{EntityRef, WhereExpressionBuilder},
    Result, Where,
};

use keel_core::{schema::Relation, Error};

use tracing::debug;

/// Unlinks `values` from the owners in `of`.
///
/// One-to-many children get their foreign key nulled; many-to-many junction
/// rows are deleted. Either way a single statement matches every
/// (owner, value) pair with an OR of per-pair conditions, so the lists are
/// expected to stay small.
pub(crate) async fn remove(
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

    if relation.is_one_to_many() {
        let inverse = registry
            .inverse(relation)
            .ok_or_else(|| Error::relation_not_found(&owner.name, &relation.property_path))?;
        let target = registry.target(relation);
        let join_columns = columns(registry, &inverse.join_columns);

        let mut pairs = vec![];
        for owner_ref in of {
            let owner_key = key_of(registry, &join_columns, owner_ref)?;
            for value in values {
                let mut w = updater::pointing_at(
                    registry,
                    &inverse.property_path,
                    &join_columns,
                    &owner_key,
                )?;
                for pk in target.primary_columns() {
                    let id = value
                        .property(&pk.property_path)
                        .cloned()
                        .ok_or_else(|| Error::entity_column_not_found(&pk.property_path))?;
                    w = w.set(pk.property_path.clone(), id);
                }
                pairs.push(w);
            }
        }

        debug!(target: "keel::relation", relation = %relation.property_path, pairs = pairs.len(), "clearing foreign keys");
        let update = link
            .db
            .update(&target.name)
            .set(updater::join_values(
                registry,
                &inverse.property_path,
                &join_columns,
                None,
            )?)
            .where_(pairs);
        link.bind(update).execute().await?;
        return Ok(());
    }

    if relation.is_many_to_many() {
        let junction = registry.entity(relation.junction.ok_or_else(|| {
            keel_core::err!("relation {} has no junction", relation.property_path)
        })?);
        let owner_columns = columns(registry, &relation.join_columns);
        let target_columns = columns(registry, &relation.inverse_join_columns);

        let mut pairs = vec![];
        for owner_ref in of {
            let owner_key = key_of(registry, &owner_columns, owner_ref)?;
            for value in values {
                let target_key = key_of(registry, &target_columns, value)?;

                let mut w = Where::new();
                for (column, value) in owner_columns
                    .iter()
                    .zip(&owner_key)
                    .chain(target_columns.iter().zip(&target_key))
                {
                    w = w.set(column.property_path.clone(), value.clone());
                }
                pairs.push(w);
            }
        }

        debug!(target: "keel::relation", junction = %junction.name, pairs = pairs.len(), "deleting junction rows");
        let delete = link.db.delete().from(&junction.name).where_(pairs);
        link.bind(delete).execute().await?;
        return Ok(());
    }

    Err(Error::unsupported_feature(format!(
        "{}.{} is a to-one relation; use set",
        owner.name, relation.property_path
    )))
}
