use keel_core::{
    schema::{EntityId, RelationId},
    Registry,
};
use keel_sql::stmt::JoinKind;

/// One join of a select, resolved when it is added.
#[derive(Debug, Clone)]
pub(crate) struct JoinAttribute {
    pub(crate) kind: JoinKind,

    /// Alias of the joined table; registered in the expression map.
    pub(crate) alias: String,

    /// Entity behind the joined alias, if mapped.
    pub(crate) entity: Option<EntityId>,

    /// For relation joins, the alias the relation is read from.
    pub(crate) parent_alias: Option<String>,

    pub(crate) relation: Option<RelationId>,

    /// Alias of the junction table of a many-to-many relation.
    pub(crate) junction_alias: Option<String>,

    /// Extra `ON` condition given by the caller.
    pub(crate) condition: Option<String>,

    /// `*_and_map_one` / `*_and_map_many` target.
    pub(crate) map_to: Option<MapTo>,
}

#[derive(Debug, Clone)]
pub(crate) struct MapTo {
    pub(crate) parent_alias: String,
    pub(crate) property: String,
    pub(crate) many: bool,
}

impl JoinAttribute {
    /// Whether the join hydrates into a list.
    pub(crate) fn is_many(&self, registry: &Registry) -> bool {
        match (&self.map_to, self.relation) {
            (Some(map_to), _) => map_to.many,
            (None, Some(relation)) => registry.relation(relation).is_to_many(),
            (None, None) => false,
        }
    }

    /// The property the joined rows hydrate into on the parent alias.
    pub(crate) fn target_property(&self, registry: &Registry) -> Option<(&str, String)> {
        if let Some(map_to) = &self.map_to {
            return Some((&map_to.parent_alias, map_to.property.clone()));
        }

        let parent = self.parent_alias.as_deref()?;
        let relation = registry.relation(self.relation?);
        Some((parent, relation.property_path.clone()))
    }
}

/// `load_relation_id_and_map` request.
#[derive(Debug, Clone)]
pub(crate) struct RelationIdAttribute {
    pub(crate) parent_alias: String,
    pub(crate) relation: RelationId,
    pub(crate) map_to: String,

    /// Alias used for the target table inside the loader query.
    pub(crate) alias: Option<String>,

    /// Always map composite-key maps, even for single-column keys.
    pub(crate) disable_mixed_map: bool,
}

/// `load_relation_count_and_map` request.
#[derive(Debug, Clone)]
pub(crate) struct RelationCountAttribute {
    pub(crate) parent_alias: String,
    pub(crate) relation: RelationId,
    pub(crate) map_to: String,
    pub(crate) alias: Option<String>,
}

impl RelationIdAttribute {
    pub(crate) fn junction_alias(&self, registry: &Registry) -> String {
        let relation = registry.relation(self.relation);
        let target = &registry.target(relation).name;
        let alias = self.alias.as_deref().unwrap_or(target);
        format!("{}_{}_rid", self.parent_alias, alias)
    }
}

impl RelationCountAttribute {
    pub(crate) fn junction_alias(&self, registry: &Registry) -> String {
        let relation = registry.relation(self.relation);
        let target = &registry.target(relation).name;
        let alias = self.alias.as_deref().unwrap_or(target);
        format!("{}_{}_rc", self.parent_alias, alias)
    }
}
