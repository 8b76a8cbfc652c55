use super::{EntityId, RelationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId {
    pub entity: EntityId,
    pub index: usize,
}

/// A mapped column of an entity.
#[derive(Debug, Clone)]
pub struct Column {
    pub id: ColumnId,

    /// Entity whose definition declared the column. Differs from `id.entity`
    /// for columns shared through single-table inheritance.
    pub owner: EntityId,

    /// Last segment of the property path.
    pub property_name: String,

    /// Dotted path from the entity root, e.g. `counters.likes` for a column
    /// of an embedded object.
    pub property_path: String,

    /// Physical column name.
    pub database_name: String,

    /// Database type tag, e.g. `int`, `varchar`, `uuid`, `geometry`.
    pub ty: String,

    pub nullable: bool,
    pub primary: bool,
    pub generated: Option<Generation>,

    /// Default expression used when a value is missing from an insert.
    pub default: Option<String>,

    /// Included when the whole entity is selected.
    pub select: bool,
    pub insert: bool,
    pub update: bool,

    pub mode: ColumnMode,

    /// Path of the embedded object this column lives in.
    pub embedded: Option<String>,

    /// For join columns, the column they reference in the related entity.
    pub referenced_column: Option<ColumnId>,

    /// For join columns, the relation that owns them.
    pub relation: Option<RelationId>,

    /// Synthesized join column with no property of its own.
    pub is_virtual: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Increment,
    Uuid,
    Rowid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMode {
    Regular,
    Version,
    CreateDate,
    UpdateDate,
    DeleteDate,
    Discriminator,
}

impl Column {
    pub fn is_generated(&self) -> bool {
        self.generated.is_some()
    }

    pub fn is_version(&self) -> bool {
        self.mode == ColumnMode::Version
    }

    pub fn is_discriminator(&self) -> bool {
        self.mode == ColumnMode::Discriminator
    }

    pub fn is_update_date(&self) -> bool {
        self.mode == ColumnMode::UpdateDate
    }

    pub fn is_delete_date(&self) -> bool {
        self.mode == ColumnMode::DeleteDate
    }

    pub fn is_create_date(&self) -> bool {
        self.mode == ColumnMode::CreateDate
    }
}
