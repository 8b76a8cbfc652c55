use super::{ColumnMode, Generation, OrderDirection, RelationType};

/// Declarative definition of an entity, compiled into [`super::EntityMetadata`]
/// by [`super::Builder`].
#[derive(Debug, Clone)]
pub struct EntityDef {
    pub name: String,
    pub table: Option<String>,
    pub schema: Option<String>,
    pub database: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub embeddeds: Vec<EmbeddedDef>,
    pub relations: Vec<RelationDef>,
    pub indices: Vec<IndexDef>,
    pub checks: Vec<(String, String)>,
    pub order_by: Vec<(String, OrderDirection)>,

    /// Name of the single-table inheritance parent.
    pub inherits: Option<String>,
    pub discriminator_value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub property_name: String,
    pub name: Option<String>,
    pub ty: String,
    pub nullable: bool,
    pub primary: bool,
    pub generated: Option<Generation>,
    pub default: Option<String>,
    pub select: bool,
    pub insert: bool,
    pub update: bool,
    pub mode: ColumnMode,
}

#[derive(Debug, Clone)]
pub struct EmbeddedDef {
    pub property_name: String,

    /// Column name prefix. Defaults to the property name; `Some("")`
    /// disables prefixing.
    pub prefix: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub embeddeds: Vec<EmbeddedDef>,
}

#[derive(Debug, Clone)]
pub struct RelationDef {
    pub property_name: String,
    pub ty: RelationType,
    pub target: String,
    pub inverse_side: Option<String>,
    pub nullable: bool,

    /// One-to-one: this side holds the foreign key.
    pub join_column: bool,
    pub join_columns: Vec<JoinColumnDef>,

    /// Many-to-many: this side owns the junction table, optionally named.
    pub join_table: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct JoinColumnDef {
    pub name: Option<String>,

    /// Property name of the referenced column; defaults to the target's
    /// primary column.
    pub referenced_column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> EntityDef {
        EntityDef {
            name: name.into(),
            table: None,
            schema: None,
            database: None,
            columns: vec![],
            embeddeds: vec![],
            relations: vec![],
            indices: vec![],
            checks: vec![],
            order_by: vec![],
            inherits: None,
            discriminator_value: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn embedded(mut self, embedded: EmbeddedDef) -> Self {
        self.embeddeds.push(embedded);
        self
    }

    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indices.push(index);
        self
    }

    pub fn check(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.checks.push((name.into(), expression.into()));
        self
    }

    pub fn order_by(mut self, property_path: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push((property_path.into(), direction));
        self
    }

    /// Makes this entity a single-table inheritance child of `parent`.
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits = Some(parent.into());
        self
    }

    pub fn discriminator_value(mut self, value: impl Into<String>) -> Self {
        self.discriminator_value = Some(value.into());
        self
    }
}

impl ColumnDef {
    pub fn new(property_name: impl Into<String>, ty: impl Into<String>) -> ColumnDef {
        ColumnDef {
            property_name: property_name.into(),
            name: None,
            ty: ty.into(),
            nullable: false,
            primary: false,
            generated: None,
            default: None,
            select: true,
            insert: true,
            update: true,
            mode: ColumnMode::Regular,
        }
    }

    pub fn primary(property_name: impl Into<String>, ty: impl Into<String>) -> ColumnDef {
        ColumnDef {
            primary: true,
            ..ColumnDef::new(property_name, ty)
        }
    }

    /// Auto-increment integer primary key.
    pub fn primary_generated(property_name: impl Into<String>) -> ColumnDef {
        ColumnDef::primary(property_name, "int").generated(Generation::Increment)
    }

    /// UUID primary key.
    pub fn primary_uuid(property_name: impl Into<String>) -> ColumnDef {
        ColumnDef::primary(property_name, "uuid").generated(Generation::Uuid)
    }

    pub fn version(property_name: impl Into<String>) -> ColumnDef {
        ColumnDef::new(property_name, "int").mode(ColumnMode::Version)
    }

    pub fn create_date(property_name: impl Into<String>) -> ColumnDef {
        ColumnDef::new(property_name, "timestamp")
            .mode(ColumnMode::CreateDate)
            .default("CURRENT_TIMESTAMP")
    }

    pub fn update_date(property_name: impl Into<String>) -> ColumnDef {
        ColumnDef::new(property_name, "timestamp")
            .mode(ColumnMode::UpdateDate)
            .default("CURRENT_TIMESTAMP")
    }

    pub fn delete_date(property_name: impl Into<String>) -> ColumnDef {
        ColumnDef::new(property_name, "timestamp")
            .mode(ColumnMode::DeleteDate)
            .nullable()
    }

    pub fn discriminator(property_name: impl Into<String>) -> ColumnDef {
        ColumnDef::new(property_name, "varchar").mode(ColumnMode::Discriminator)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn generated(mut self, generation: Generation) -> Self {
        self.generated = Some(generation);
        self
    }

    pub fn default(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    pub fn select(mut self, select: bool) -> Self {
        self.select = select;
        self
    }

    pub fn insert(mut self, insert: bool) -> Self {
        self.insert = insert;
        self
    }

    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    fn mode(mut self, mode: ColumnMode) -> Self {
        self.mode = mode;
        self
    }
}

impl EmbeddedDef {
    pub fn new(property_name: impl Into<String>) -> EmbeddedDef {
        EmbeddedDef {
            property_name: property_name.into(),
            prefix: None,
            columns: vec![],
            embeddeds: vec![],
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn embedded(mut self, embedded: EmbeddedDef) -> Self {
        self.embeddeds.push(embedded);
        self
    }
}

impl RelationDef {
    fn new(property_name: impl Into<String>, ty: RelationType, target: impl Into<String>) -> Self {
        RelationDef {
            property_name: property_name.into(),
            ty,
            target: target.into(),
            inverse_side: None,
            nullable: true,
            join_column: false,
            join_columns: vec![],
            join_table: None,
        }
    }

    pub fn many_to_one(property_name: impl Into<String>, target: impl Into<String>) -> Self {
        RelationDef::new(property_name, RelationType::ManyToOne, target)
    }

    pub fn one_to_many(
        property_name: impl Into<String>,
        target: impl Into<String>,
        inverse_side: impl Into<String>,
    ) -> Self {
        RelationDef::new(property_name, RelationType::OneToMany, target).inverse(inverse_side)
    }

    pub fn one_to_one(property_name: impl Into<String>, target: impl Into<String>) -> Self {
        RelationDef::new(property_name, RelationType::OneToOne, target)
    }

    pub fn many_to_many(property_name: impl Into<String>, target: impl Into<String>) -> Self {
        RelationDef::new(property_name, RelationType::ManyToMany, target)
    }

    pub fn inverse(mut self, inverse_side: impl Into<String>) -> Self {
        self.inverse_side = Some(inverse_side.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// One-to-one: this side holds the foreign key.
    pub fn join_column(mut self) -> Self {
        self.join_column = true;
        self
    }

    pub fn join_columns(mut self, columns: impl IntoIterator<Item = JoinColumnDef>) -> Self {
        self.join_column = true;
        self.join_columns.extend(columns);
        self
    }

    /// Many-to-many: this side owns the junction table.
    pub fn join_table(mut self) -> Self {
        self.join_table = Some(None);
        self
    }

    pub fn join_table_named(mut self, name: impl Into<String>) -> Self {
        self.join_table = Some(Some(name.into()));
        self
    }
}

impl JoinColumnDef {
    pub fn named(name: impl Into<String>) -> JoinColumnDef {
        JoinColumnDef {
            name: Some(name.into()),
            referenced_column: None,
        }
    }

    pub fn references(mut self, property_name: impl Into<String>) -> Self {
        self.referenced_column = Some(property_name.into());
        self
    }
}

impl IndexDef {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> IndexDef {
        IndexDef {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}
