use super::{
    Check, Column, ColumnDef, ColumnId, ColumnMode, DefaultNamingStrategy, EmbeddedDef, Embedded,
    EntityDef, EntityId, EntityKind, EntityMetadata, Generation, Index, NamingStrategy, Registry,
    Relation, RelationDef, RelationId, RelationType, TablePath,
};
use crate::{driver::Capability, driver::DatabaseKind, Error, Result};

use indexmap::IndexMap;
use std::sync::Arc;

/// Compiles entity definitions into an immutable [`Registry`].
#[derive(Debug)]
pub struct Builder {
    defs: Vec<EntityDef>,
    naming: Arc<dyn NamingStrategy>,
    table_prefix: Option<String>,
}

/// A column definition flattened out of its embedded objects.
struct FlatColumn<'a> {
    def: &'a ColumnDef,
    property_path: String,
    embedded: Option<String>,
    prefixes: Vec<String>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            defs: vec![],
            naming: Arc::new(DefaultNamingStrategy),
            table_prefix: None,
        }
    }

    pub fn entity(&mut self, def: EntityDef) -> &mut Self {
        self.defs.push(def);
        self
    }

    pub fn naming_strategy(&mut self, naming: Arc<dyn NamingStrategy>) -> &mut Self {
        self.naming = naming;
        self
    }

    pub fn table_name_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    pub fn build(&self, capability: &Capability) -> Result<Registry> {
        let mut registry = Registry::default();

        for (index, def) in self.defs.iter().enumerate() {
            if registry.by_name.insert(def.name.clone(), EntityId(index)).is_some() {
                return Err(Error::invalid_schema(format!(
                    "entity {} is defined more than once",
                    def.name
                )));
            }
        }

        // Tables and inheritance links
        for (index, def) in self.defs.iter().enumerate() {
            let parent = match &def.inherits {
                Some(parent) => {
                    let parent_id = self.entity_id(&registry, parent, &def.name)?;
                    if self.defs[parent_id.0].inherits.is_some() {
                        return Err(Error::invalid_schema(format!(
                            "entity {} inherits from {} which is itself a child entity",
                            def.name, parent
                        )));
                    }
                    Some(parent_id)
                }
                None => None,
            };

            let table = match parent {
                Some(parent_id) => self.table_path(&self.defs[parent_id.0]),
                None => self.table_path(def),
            };

            registry.entities.push(EntityMetadata {
                id: EntityId(index),
                name: def.name.clone(),
                table,
                kind: if parent.is_some() {
                    EntityKind::Child
                } else {
                    EntityKind::Regular
                },
                columns: vec![],
                relations: vec![],
                embeddeds: vec![],
                indices: vec![],
                checks: vec![],
                primary_columns: vec![],
                version_column: None,
                create_date_column: None,
                update_date_column: None,
                delete_date_column: None,
                discriminator_column: None,
                discriminator_value: None,
                parent,
                children: vec![],
                order_by: def.order_by.clone(),
            });
        }

        for index in 0..self.defs.len() {
            if let Some(parent) = registry.entities[index].parent {
                registry.entities[parent.0].children.push(EntityId(index));
            }
        }

        // Columns. A child sees its parent's columns followed by its own; a
        // parent also maps its children's columns since they share a table.
        for (index, def) in self.defs.iter().enumerate() {
            let id = EntityId(index);
            let mut defs: Vec<(EntityId, &EntityDef)> = vec![];
            if let Some(parent) = registry.entities[index].parent {
                defs.push((parent, &self.defs[parent.0]));
            }
            defs.push((id, def));
            for child in registry.entities[index].children.clone() {
                defs.push((child, &self.defs[child.0]));
            }

            for (owner, source) in defs {
                for flat in flatten(&source.columns, &source.embeddeds, None, &[]) {
                    self.push_column(&mut registry.entities[index], owner, &flat, capability)?;
                }
                push_embeddeds(&mut registry.entities[index], &source.embeddeds, None);
            }
        }

        // Discriminators
        for (index, def) in self.defs.iter().enumerate() {
            let entity = &mut registry.entities[index];
            if entity.kind == EntityKind::Child || !entity.children.is_empty() {
                if entity.discriminator_column.is_none() {
                    return Err(Error::invalid_schema(format!(
                        "entity {} uses single-table inheritance but has no discriminator column",
                        def.name
                    )));
                }
                entity.discriminator_value = Some(
                    def.discriminator_value
                        .clone()
                        .unwrap_or_else(|| def.name.clone()),
                );
            }
        }

        // Relations and join columns
        for (index, def) in self.defs.iter().enumerate() {
            let mut relation_defs: Vec<&RelationDef> = vec![];
            if let Some(parent) = registry.entities[index].parent {
                relation_defs.extend(&self.defs[parent.0].relations);
            }
            relation_defs.extend(&def.relations);

            for relation_def in relation_defs {
                self.push_relation(&mut registry, EntityId(index), relation_def)?;
            }
        }

        self.resolve_inverse_sides(&mut registry)?;

        // Indices, checks and primary keys
        for (index, def) in self.defs.iter().enumerate() {
            let entity = &mut registry.entities[index];

            for index_def in &def.indices {
                let mut columns = vec![];
                for path in &index_def.columns {
                    let column = entity.find_column_with_property_path(path).ok_or_else(|| {
                        Error::invalid_schema(format!(
                            "index on {} references unknown property {}",
                            def.name, path
                        ))
                    })?;
                    columns.push(column.id);
                }

                let name = index_def.name.clone().unwrap_or_else(|| {
                    let names: Vec<&str> = columns
                        .iter()
                        .map(|id| entity.columns[id.index].database_name.as_str())
                        .collect();
                    format!(
                        "{}_{}_{}",
                        if index_def.unique { "UQ" } else { "IDX" },
                        entity.table.table,
                        names.join("_")
                    )
                });

                entity.indices.push(Index {
                    name,
                    columns,
                    unique: index_def.unique,
                });
            }

            for (name, expression) in &def.checks {
                entity.checks.push(Check {
                    name: name.clone(),
                    expression: expression.clone(),
                });
            }

            if entity.primary_columns.is_empty() {
                return Err(Error::invalid_schema(format!(
                    "entity {} does not have a primary column",
                    def.name
                )));
            }

            for (path, _) in &entity.order_by {
                if entity.find_column_with_property_path(path).is_none() {
                    return Err(Error::invalid_schema(format!(
                        "default order of {} references unknown property {}",
                        def.name, path
                    )));
                }
            }
        }

        Ok(registry)
    }

    fn entity_id(&self, registry: &Registry, target: &str, referrer: &str) -> Result<EntityId> {
        registry.by_name.get(target).copied().ok_or_else(|| {
            Error::invalid_schema(format!(
                "entity {referrer} references unknown entity {target}"
            ))
        })
    }

    fn table_path(&self, def: &EntityDef) -> TablePath {
        let table = self.naming.table_name(&def.name, def.table.as_deref());
        TablePath {
            database: def.database.clone(),
            schema: def.schema.clone(),
            table: format!("{}{}", self.table_prefix.as_deref().unwrap_or(""), table),
        }
    }

    fn push_column(
        &self,
        entity: &mut EntityMetadata,
        owner: EntityId,
        flat: &FlatColumn<'_>,
        capability: &Capability,
    ) -> Result<()> {
        let def = flat.def;

        if entity
            .columns
            .iter()
            .any(|c| c.property_path == flat.property_path)
        {
            return Err(Error::invalid_schema(format!(
                "entity {} maps property {} more than once",
                entity.name, flat.property_path
            )));
        }

        if def.generated == Some(Generation::Rowid)
            && capability.kind != DatabaseKind::Cockroachdb
        {
            return Err(Error::invalid_schema(format!(
                "rowid generation of {}.{} is only supported by CockroachDB",
                entity.name, flat.property_path
            )));
        }

        let prefixes: Vec<&str> = flat.prefixes.iter().map(String::as_str).collect();
        let column_id = ColumnId {
            entity: entity.id,
            index: entity.columns.len(),
        };

        entity.columns.push(Column {
            id: column_id,
            owner,
            property_name: def.property_name.clone(),
            property_path: flat.property_path.clone(),
            database_name: self
                .naming
                .column_name(&def.property_name, def.name.as_deref(), &prefixes),
            ty: def.ty.clone(),
            nullable: def.nullable,
            primary: def.primary,
            generated: def.generated,
            default: def.default.clone(),
            select: def.select,
            insert: def.insert,
            update: def.update,
            mode: def.mode,
            embedded: flat.embedded.clone(),
            referenced_column: None,
            relation: None,
            is_virtual: false,
        });

        if def.primary {
            entity.primary_columns.push(column_id);
        }

        let slot = match def.mode {
            ColumnMode::Regular => None,
            ColumnMode::Version => Some(&mut entity.version_column),
            ColumnMode::CreateDate => Some(&mut entity.create_date_column),
            ColumnMode::UpdateDate => Some(&mut entity.update_date_column),
            ColumnMode::DeleteDate => Some(&mut entity.delete_date_column),
            ColumnMode::Discriminator => Some(&mut entity.discriminator_column),
        };
        if let Some(slot) = slot {
            if slot.is_some() {
                return Err(Error::invalid_schema(format!(
                    "entity {} declares more than one {:?} column",
                    entity.name, def.mode
                )));
            }
            *slot = Some(column_id);
        }

        Ok(())
    }

    fn push_relation(
        &self,
        registry: &mut Registry,
        owner: EntityId,
        def: &RelationDef,
    ) -> Result<()> {
        let target = self.entity_id(registry, &def.target, &registry.entity(owner).name.clone())?;
        let relation_id = RelationId {
            entity: owner,
            index: registry.entities[owner.0].relations.len(),
        };

        let is_owning = match def.ty {
            RelationType::ManyToOne => true,
            RelationType::OneToOne => def.join_column,
            RelationType::OneToMany => false,
            RelationType::ManyToMany => def.join_table.is_some(),
        };

        let mut relation = Relation {
            id: relation_id,
            property_name: def.property_name.clone(),
            property_path: def.property_name.clone(),
            ty: def.ty,
            target,
            inverse: None,
            is_owning,
            nullable: def.nullable,
            join_columns: vec![],
            inverse_join_columns: vec![],
            junction: None,
        };

        match def.ty {
            RelationType::ManyToOne | RelationType::OneToOne if is_owning => {
                relation.join_columns = self.push_join_columns(registry, owner, relation_id, def)?;
            }
            RelationType::ManyToMany if is_owning => {
                self.push_junction(registry, owner, &mut relation, def)?;
            }
            _ => {}
        }

        registry.entities[owner.0].relations.push(relation);
        Ok(())
    }

    fn push_join_columns(
        &self,
        registry: &mut Registry,
        owner: EntityId,
        relation_id: RelationId,
        def: &RelationDef,
    ) -> Result<Vec<ColumnId>> {
        let target = &registry.entities[registry.by_name[&def.target].0];

        let referenced: Vec<(Option<String>, Column)> = if def.join_columns.is_empty() {
            target.primary_columns().map(|c| (None, c.clone())).collect()
        } else {
            let mut referenced = vec![];
            for join_column in &def.join_columns {
                let column = match &join_column.referenced_column {
                    Some(path) => target.find_column_with_property_path(path),
                    None => target.primary_columns().next(),
                }
                .ok_or_else(|| {
                    Error::invalid_schema(format!(
                        "join column of {} references an unknown column of {}",
                        def.property_name, target.name
                    ))
                })?;
                referenced.push((join_column.name.clone(), column.clone()));
            }
            referenced
        };

        let entity = &mut registry.entities[owner.0];
        let mut ids = vec![];

        for (name, referenced) in referenced {
            let database_name = name.unwrap_or_else(|| {
                self.naming
                    .join_column_name(&def.property_name, &referenced.property_name)
            });

            // An explicitly mapped column with the same name doubles as the
            // foreign key.
            if let Some(existing) = entity
                .columns
                .iter_mut()
                .find(|c| c.database_name == database_name)
            {
                existing.referenced_column = Some(referenced.id);
                existing.relation = Some(relation_id);
                ids.push(existing.id);
                continue;
            }

            let id = ColumnId {
                entity: owner,
                index: entity.columns.len(),
            };
            entity.columns.push(Column {
                id,
                owner,
                property_name: def.property_name.clone(),
                property_path: def.property_name.clone(),
                database_name,
                ty: referenced.ty.clone(),
                nullable: def.nullable,
                primary: false,
                generated: None,
                default: None,
                select: true,
                insert: true,
                update: true,
                mode: ColumnMode::Regular,
                embedded: None,
                referenced_column: Some(referenced.id),
                relation: Some(relation_id),
                is_virtual: true,
            });
            ids.push(id);
        }

        Ok(ids)
    }

    fn push_junction(
        &self,
        registry: &mut Registry,
        owner: EntityId,
        relation: &mut Relation,
        def: &RelationDef,
    ) -> Result<()> {
        let owner_meta = &registry.entities[owner.0];
        let target_meta = &registry.entities[relation.target.0];

        let table_name = match &def.join_table {
            Some(Some(name)) => name.clone(),
            _ => self.naming.join_table_name(
                &owner_meta.table.table,
                &target_meta.table.table,
                &def.property_name,
            ),
        };

        let junction_id = EntityId(registry.entities.len());
        let database = owner_meta.table.database.clone();
        let schema = owner_meta.table.schema.clone();
        let mut columns: Vec<Column> = vec![];

        let sides = [
            (owner_meta.table.table.clone(), owner_meta.primary_columns().cloned().collect::<Vec<_>>()),
            (target_meta.table.table.clone(), target_meta.primary_columns().cloned().collect()),
        ];

        let mut side_ids: [Vec<ColumnId>; 2] = [vec![], vec![]];
        for (side, (table, referenced)) in sides.iter().enumerate() {
            for referenced in referenced {
                let mut database_name = self
                    .naming
                    .join_table_column_name(table, &referenced.database_name);
                if columns.iter().any(|c| c.database_name == database_name) {
                    database_name = format!("{database_name}_{}", side + 1);
                }

                let id = ColumnId {
                    entity: junction_id,
                    index: columns.len(),
                };
                columns.push(Column {
                    id,
                    owner: junction_id,
                    property_name: database_name.clone(),
                    property_path: database_name.clone(),
                    database_name,
                    ty: referenced.ty.clone(),
                    nullable: false,
                    primary: true,
                    generated: None,
                    default: None,
                    select: true,
                    insert: true,
                    update: true,
                    mode: ColumnMode::Regular,
                    embedded: None,
                    referenced_column: Some(referenced.id),
                    relation: None,
                    is_virtual: false,
                });
                side_ids[side].push(id);
            }
        }

        let [join_columns, inverse_join_columns] = side_ids;
        relation.join_columns = join_columns;
        relation.inverse_join_columns = inverse_join_columns;
        relation.junction = Some(junction_id);

        let primary_columns = columns.iter().map(|c| c.id).collect();
        let name = table_name.clone();

        registry.entities.push(EntityMetadata {
            id: junction_id,
            name: name.clone(),
            table: TablePath {
                database,
                schema,
                table: table_name,
            },
            kind: EntityKind::Junction,
            columns,
            relations: vec![],
            embeddeds: vec![],
            indices: vec![],
            checks: vec![],
            primary_columns,
            version_column: None,
            create_date_column: None,
            update_date_column: None,
            delete_date_column: None,
            discriminator_column: None,
            discriminator_value: None,
            parent: None,
            children: vec![],
            order_by: vec![],
        });
        registry.by_name.insert(name, junction_id);

        Ok(())
    }

    fn resolve_inverse_sides(&self, registry: &mut Registry) -> Result<()> {
        // Collect each declared relation's inverse property first, then link.
        let mut links: IndexMap<RelationId, RelationId> = IndexMap::new();

        for (index, def) in self.defs.iter().enumerate() {
            let entity = &registry.entities[index];
            let mut relation_defs: Vec<&RelationDef> = vec![];
            if let Some(parent) = entity.parent {
                relation_defs.extend(&self.defs[parent.0].relations);
            }
            relation_defs.extend(&def.relations);

            for (relation_index, relation_def) in relation_defs.iter().enumerate() {
                let Some(inverse_side) = &relation_def.inverse_side else {
                    continue;
                };
                let relation = &entity.relations[relation_index];
                let target = registry.entity(relation.target);
                let inverse = target
                    .find_relation_with_property_path(inverse_side)
                    .ok_or_else(|| {
                        Error::invalid_schema(format!(
                            "relation {}.{} names inverse side {}, which is not a relation of {}",
                            entity.name, relation.property_name, inverse_side, target.name
                        ))
                    })?;
                links.insert(relation.id, inverse.id);
                links.entry(inverse.id).or_insert(relation.id);
            }
        }

        for (relation_id, inverse_id) in &links {
            registry.entities[relation_id.entity.0].relations[relation_id.index].inverse =
                Some(*inverse_id);
        }

        for index in 0..registry.entities.len() {
            for relation_index in 0..registry.entities[index].relations.len() {
                let relation = registry.entities[index].relations[relation_index].clone();
                if relation.is_owning {
                    continue;
                }

                let inverse = relation.inverse.map(|id| registry.relation(id).clone());
                let entity_name = registry.entities[index].name.clone();

                match (relation.ty, inverse) {
                    (RelationType::OneToMany, Some(inverse)) if inverse.is_many_to_one() => {}
                    (RelationType::OneToOne, Some(inverse)) if inverse.is_one_to_one_owner() => {}
                    (RelationType::ManyToMany, Some(inverse))
                        if inverse.is_many_to_many() && inverse.is_owning =>
                    {
                        let relation = &mut registry.entities[index].relations[relation_index];
                        relation.junction = inverse.junction;
                        relation.join_columns = inverse.inverse_join_columns.clone();
                        relation.inverse_join_columns = inverse.join_columns.clone();
                    }
                    _ => {
                        return Err(Error::invalid_schema(format!(
                            "relation {}.{} has no owning side; declare a join column or join table on one side",
                            entity_name, relation.property_name
                        )))
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

fn flatten<'a>(
    columns: &'a [ColumnDef],
    embeddeds: &'a [EmbeddedDef],
    parent: Option<&str>,
    prefixes: &[String],
) -> Vec<FlatColumn<'a>> {
    let path = |name: &str| match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    };

    let mut ret: Vec<FlatColumn<'a>> = columns
        .iter()
        .map(|def| FlatColumn {
            def,
            property_path: path(&def.property_name),
            embedded: parent.map(str::to_string),
            prefixes: prefixes.to_vec(),
        })
        .collect();

    for embedded in embeddeds {
        let embedded_path = path(&embedded.property_name);
        let mut prefixes = prefixes.to_vec();
        match embedded.prefix.as_deref() {
            Some("") => {}
            Some(prefix) => prefixes.push(prefix.to_string()),
            None => prefixes.push(embedded.property_name.clone()),
        }
        ret.extend(flatten(
            &embedded.columns,
            &embedded.embeddeds,
            Some(&embedded_path),
            &prefixes,
        ));
    }

    ret
}

fn push_embeddeds(entity: &mut EntityMetadata, embeddeds: &[EmbeddedDef], parent: Option<&str>) {
    for embedded in embeddeds {
        let property_path = match parent {
            Some(parent) => format!("{parent}.{}", embedded.property_name),
            None => embedded.property_name.clone(),
        };
        if entity.find_embedded_with_property_path(&property_path).is_none() {
            entity.embeddeds.push(Embedded {
                property_name: embedded.property_name.clone(),
                property_path: property_path.clone(),
                parent: parent.map(str::to_string),
            });
        }
        push_embeddeds(entity, &embedded.embeddeds, Some(&property_path));
    }
}
