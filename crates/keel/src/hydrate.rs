//! Turns joined result rows back into entities.
//!
//! Rows are grouped by the primary key of each alias, so an entity joined
//! to many children appears once with all its children attached. Columns
//! are read back under their projection alias (`alias_column`).

use crate::{
    loader::{RelationCounts, RelationIds},
    query::{build_alias, selected_columns, EntityRef, ExpressionMap},
    Db, Result,
};

use keel_core::{
    schema::EntityMetadata,
    stmt::{Row, Value},
    Registry,
};

use indexmap::IndexMap;

/// A loaded entity: property values by name, with joined relations and
/// embedded objects nested.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Entity {
    name: String,
    values: IndexMap<String, EntityValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityValue {
    Value(Value),

    /// A to-one relation or an embedded object.
    Entity(Box<Entity>),

    /// A to-many relation, or the ids of one.
    List(Vec<EntityValue>),
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Entity {
        Entity {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    /// Name of the entity (for a child of an inheritance tree, the child's).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a dotted property path, walking into nested entities.
    pub fn get(&self, path: &str) -> Option<&EntityValue> {
        match path.split_once('.') {
            Some((head, rest)) => match self.values.get(head)? {
                EntityValue::Entity(inner) => inner.get(rest),
                _ => None,
            },
            None => self.values.get(path),
        }
    }

    pub fn value(&self, path: &str) -> Option<&Value> {
        self.get(path)?.as_value()
    }

    pub fn entity(&self, path: &str) -> Option<&Entity> {
        self.get(path)?.as_entity()
    }

    pub fn list(&self, path: &str) -> Option<&[EntityValue]> {
        self.get(path)?.as_list()
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<EntityValue>) {
        self.values.insert(property.into(), value.into());
    }

    /// Sets a dotted property path, creating intermediate objects.
    pub fn set_path(&mut self, path: &str, value: impl Into<EntityValue>) {
        match path.split_once('.') {
            Some((head, rest)) => {
                let slot = self
                    .values
                    .entry(head.to_string())
                    .or_insert_with(|| EntityValue::Entity(Box::new(Entity::new(head))));

                if !matches!(slot, EntityValue::Entity(_)) {
                    *slot = EntityValue::Entity(Box::new(Entity::new(head)));
                }
                if let EntityValue::Entity(inner) = slot {
                    inner.set_path(rest, value);
                }
            }
            None => self.set(path, value),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Plain values keyed by dotted property path. Lists are skipped.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        self.flatten_into("", &mut row);
        row
    }

    fn flatten_into(&self, prefix: &str, row: &mut Row) {
        for (property, value) in &self.values {
            let path = format!("{prefix}{property}");
            match value {
                EntityValue::Value(value) => row.insert(path, value.clone()),
                EntityValue::Entity(inner) => inner.flatten_into(&format!("{path}."), row),
                EntityValue::List(_) => {}
            }
        }
    }
}

impl EntityValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            EntityValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            EntityValue::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[EntityValue]> {
        match self {
            EntityValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EntityValue::Value(Value::Null))
    }
}

impl From<Value> for EntityValue {
    fn from(src: Value) -> EntityValue {
        EntityValue::Value(src)
    }
}

impl From<Entity> for EntityValue {
    fn from(src: Entity) -> EntityValue {
        EntityValue::Entity(Box::new(src))
    }
}

impl From<Vec<Entity>> for EntityValue {
    fn from(src: Vec<Entity>) -> EntityValue {
        EntityValue::List(src.into_iter().map(EntityValue::from).collect())
    }
}

impl From<&Entity> for EntityRef {
    fn from(src: &Entity) -> EntityRef {
        EntityRef::Object(src.to_row())
    }
}

impl From<Entity> for EntityRef {
    fn from(src: Entity) -> EntityRef {
        EntityRef::Object(src.to_row())
    }
}

/// Hydrates the main alias of `map` from `rows`. A main alias without
/// metadata yields no entities.
pub(crate) fn transform(
    db: &Db,
    map: &ExpressionMap,
    rows: &[Row],
    relation_ids: &[RelationIds],
    relation_counts: &[RelationCounts],
) -> Result<Vec<Entity>> {
    let registry: &Registry = db.registry();
    let main = map.main_alias()?;
    let Some(metadata) = main.metadata(registry) else {
        return Ok(vec![]);
    };

    let transformer = Transformer {
        registry,
        map,
        max_alias_length: db.max_alias_length(),
        relation_ids,
        relation_counts,
    };

    let rows: Vec<&Row> = rows.iter().collect();
    Ok(transformer.transform(&rows, &main.name, metadata))
}

struct Transformer<'a> {
    registry: &'a Registry,
    map: &'a ExpressionMap,
    max_alias_length: Option<usize>,
    relation_ids: &'a [RelationIds],
    relation_counts: &'a [RelationCounts],
}

impl Transformer<'_> {
    fn key(&self, alias: &str, column: &str) -> String {
        build_alias(self.max_alias_length, &[alias, column])
    }

    fn transform(&self, rows: &[&Row], alias: &str, metadata: &EntityMetadata) -> Vec<Entity> {
        let keys: Vec<String> = metadata
            .primary_columns()
            .map(|pk| self.key(alias, &pk.database_name))
            .collect();

        let mut groups: IndexMap<String, Vec<&Row>> = IndexMap::new();
        for row in rows {
            let values: Vec<&Value> = keys.iter().map(|key| row.get_or_null(key)).collect();

            // outer join miss
            if values.iter().all(|value| value.is_null()) {
                continue;
            }

            let group = values
                .iter()
                .map(|value| value.key_fragment())
                .collect::<Vec<_>>()
                .join("_");
            groups.entry(group).or_default().push(*row);
        }

        groups
            .values()
            .map(|rows| self.transform_one(rows, alias, metadata))
            .collect()
    }

    fn transform_one(&self, rows: &[&Row], alias: &str, metadata: &EntityMetadata) -> Entity {
        let first = rows[0];

        let metadata = match metadata.discriminator_column() {
            Some(column) => match first
                .get(&self.key(alias, &column.database_name))
                .and_then(Value::as_str)
            {
                Some(value) => self.registry.discriminated(metadata, value),
                None => metadata,
            },
            None => metadata,
        };

        let mut entity = Entity::new(&metadata.name);

        for (column, visible) in selected_columns(self.map, self.registry, alias, metadata) {
            if !visible || column.is_virtual {
                continue;
            }
            if let Some(value) = first.get(&self.key(alias, &column.database_name)) {
                entity.set_path(&column.property_path, value.clone());
            }
        }

        self.transform_joins(&mut entity, rows, alias);
        self.transform_relation_ids(&mut entity, first, alias);
        self.transform_relation_counts(&mut entity, first, alias);

        entity
    }

    fn transform_joins(&self, entity: &mut Entity, rows: &[&Row], alias: &str) {
        for join in &self.map.joins {
            let Some((parent, property)) = join.target_property(self.registry) else {
                continue;
            };
            if parent != alias || !self.map.selects_any_of(&join.alias) {
                continue;
            }

            let many = join.is_many(self.registry);

            let children = match join.entity.map(|id| self.registry.entity(id)) {
                Some(target) => self.transform(rows, &join.alias, target),
                None => raw_objects(rows, &join.alias),
            };

            let value = if many {
                EntityValue::from(children)
            } else {
                match children.into_iter().next() {
                    Some(child) => EntityValue::from(child),
                    None => EntityValue::Value(Value::Null),
                }
            };

            entity.set_path(&property, value);
        }
    }

    fn transform_relation_ids(&self, entity: &mut Entity, row: &Row, alias: &str) {
        for loaded in self
            .relation_ids
            .iter()
            .filter(|loaded| loaded.attribute.parent_alias == alias)
        {
            let owner: Vec<&Value> = loaded
                .owner_columns
                .iter()
                .map(|column| row.get_or_null(&self.key(alias, column)))
                .collect();

            let ids: Vec<EntityValue> = loaded
                .rows
                .iter()
                .filter(|id| {
                    id.owner.len() == owner.len()
                        && id.owner.iter().zip(&owner).all(|(a, b)| a.loose_eq(b))
                })
                .map(|id| {
                    let mut values = id.id.iter();
                    match (values.next(), values.next()) {
                        (Some((_, value)), None) if !loaded.attribute.disable_mixed_map => {
                            EntityValue::Value(value.clone())
                        }
                        _ => {
                            let target = self
                                .registry
                                .target(self.registry.relation(loaded.attribute.relation));
                            let mut object = Entity::new(&target.name);
                            for (property, value) in id.id.iter() {
                                object.set_path(property, value.clone());
                            }
                            EntityValue::from(object)
                        }
                    }
                })
                .collect();

            let property = strip_alias(&loaded.attribute.map_to);
            let relation = self.registry.relation(loaded.attribute.relation);

            let value = if relation.is_to_many() {
                EntityValue::List(ids)
            } else {
                ids.into_iter()
                    .next()
                    .unwrap_or(EntityValue::Value(Value::Null))
            };

            entity.set_path(property, value);
        }
    }

    fn transform_relation_counts(&self, entity: &mut Entity, row: &Row, alias: &str) {
        for loaded in self
            .relation_counts
            .iter()
            .filter(|loaded| loaded.attribute.parent_alias == alias)
        {
            let owner = row.get_or_null(&self.key(alias, &loaded.owner_column));
            let count = loaded
                .counts
                .iter()
                .find(|(id, _)| id.loose_eq(owner))
                .map(|(_, count)| *count)
                .unwrap_or(0);

            entity.set_path(strip_alias(&loaded.attribute.map_to), Value::I64(count));
        }
    }
}

/// Objects for a join target without metadata: the columns read back with
/// the `alias_` prefix, one object per row.
fn raw_objects(rows: &[&Row], alias: &str) -> Vec<Entity> {
    let prefix = format!("{alias}_");

    rows.iter()
        .filter_map(|row| {
            let mut object = Entity::new(alias);
            for (key, value) in row.iter() {
                if let Some(property) = key.strip_prefix(prefix.as_str()) {
                    object.set(property, value.clone());
                }
            }
            (!object.is_empty()).then_some(object)
        })
        .collect()
}

/// `alias.prop.path` -> `prop.path`
fn strip_alias(map_to: &str) -> &str {
    map_to.split_once('.').map(|(_, rest)| rest).unwrap_or(map_to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_paths() {
        let mut post = Entity::new("Post");
        post.set("id", Value::from(1));
        post.set_path("counters.likes", Value::from(3));

        assert_eq!(post.value("id"), Some(&Value::from(1)));
        assert_eq!(post.value("counters.likes"), Some(&Value::from(3)));
        assert!(post.entity("counters").is_some());
        assert_eq!(post.value("counters.nope"), None);

        let row = post.to_row();
        assert_eq!(row.get("counters.likes"), Some(&Value::from(3)));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn entities_convert_to_refs() {
        let mut author = Entity::new("User");
        author.set("id", Value::from(7));

        match EntityRef::from(&author) {
            EntityRef::Object(row) => assert_eq!(row.get("id"), Some(&Value::from(7))),
            other => panic!("unexpected ref {other:?}"),
        }
    }

    #[test]
    fn raw_join_objects_use_the_alias_prefix() {
        let row = Row::new()
            .with("post_id", 1)
            .with("stats_views", 10)
            .with("stats_shares", 2);
        let objects = raw_objects(&[&row], "stats");

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].value("views"), Some(&Value::from(10)));
        assert_eq!(objects[0].value("shares"), Some(&Value::from(2)));
        assert_eq!(objects[0].value("id"), None);
    }
}
