use super::{Column, ColumnId, EntityId, EntityMetadata, Relation, RelationId};
use crate::{Error, Result};

use indexmap::IndexMap;

/// Compiled, immutable metadata for every entity of one database.
///
/// Built once by [`super::Builder`] and shared by reference (usually behind
/// an `Arc`) across all query builders.
#[derive(Debug, Default)]
pub struct Registry {
    pub(super) entities: Vec<EntityMetadata>,
    pub(super) by_name: IndexMap<String, EntityId>,
}

impl Registry {
    pub fn entity(&self, id: EntityId) -> &EntityMetadata {
        &self.entities[id.0]
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        self.entity(id.entity).column(id)
    }

    pub fn relation(&self, id: RelationId) -> &Relation {
        self.entity(id.entity).relation(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityMetadata> {
        self.entities.iter()
    }

    /// Finds an entity by its declared name, falling back to its table name.
    pub fn find(&self, target: &str) -> Result<&EntityMetadata> {
        self.get(target)
            .ok_or_else(|| Error::entity_metadata_not_found(target))
    }

    pub fn get(&self, target: &str) -> Option<&EntityMetadata> {
        if let Some(id) = self.by_name.get(target) {
            return Some(self.entity(*id));
        }

        self.entities
            .iter()
            .find(|e| e.table.table == target || e.table.to_string() == target)
    }

    pub fn has(&self, target: &str) -> bool {
        self.get(target).is_some()
    }

    /// The entity on the other end of `relation`.
    pub fn target(&self, relation: &Relation) -> &EntityMetadata {
        self.entity(relation.target)
    }

    /// The inverse relation, if the relation is bidirectional.
    pub fn inverse(&self, relation: &Relation) -> Option<&Relation> {
        relation.inverse.map(|id| self.relation(id))
    }

    /// Join columns holding the foreign key of `relation`, whichever side
    /// owns it.
    pub fn foreign_key_columns(&self, relation: &Relation) -> Vec<&Column> {
        if relation.is_owning || relation.is_many_to_many() {
            return relation.join_columns.iter().map(|id| self.column(*id)).collect();
        }

        match self.inverse(relation) {
            Some(inverse) => inverse
                .join_columns
                .iter()
                .map(|id| self.column(*id))
                .collect(),
            None => vec![],
        }
    }

    /// The child entities of a single-table inheritance parent.
    pub fn child_entities<'a>(
        &'a self,
        entity: &'a EntityMetadata,
    ) -> impl Iterator<Item = &'a EntityMetadata> + 'a {
        entity.children.iter().map(|id| self.entity(*id))
    }

    /// Resolves the metadata to hydrate a row with the given discriminator
    /// value: the matching child, or the entity itself.
    pub fn discriminated<'a>(
        &'a self,
        entity: &'a EntityMetadata,
        value: &str,
    ) -> &'a EntityMetadata {
        self.child_entities(entity)
            .find(|child| child.discriminator_value.as_deref() == Some(value))
            .unwrap_or(entity)
    }
}
