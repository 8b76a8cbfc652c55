use super::{Column, ColumnId, Index, Relation, RelationId};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Maps its own table.
    Regular,

    /// Single-table inheritance child sharing its parent's table.
    Child,

    /// Junction table synthesized for a many-to-many relation.
    Junction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// A possibly schema- and database-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TablePath {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl TablePath {
    pub fn new(table: impl Into<String>) -> TablePath {
        TablePath {
            database: None,
            schema: None,
            table: table.into(),
        }
    }

    /// Parses a dotted path: `table`, `schema.table` or `database.schema.table`.
    pub fn parse(path: &str) -> TablePath {
        let mut parts: Vec<&str> = path.split('.').collect();
        let table = parts.pop().unwrap_or_default().to_string();
        let schema = parts.pop().map(str::to_string);
        let database = parts.pop().map(str::to_string);
        TablePath {
            database,
            schema,
            table,
        }
    }

    /// Path segments from the outermost qualifier to the table name.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.database
            .as_deref()
            .into_iter()
            .chain(self.schema.as_deref())
            .chain(Some(self.table.as_str()))
    }
}

impl core::fmt::Display for TablePath {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut s = "";
        for part in self.parts() {
            write!(f, "{s}{part}")?;
            s = ".";
        }
        Ok(())
    }
}

/// An embedded object whose columns are stored inline in the owner's table.
#[derive(Debug, Clone)]
pub struct Embedded {
    pub property_name: String,
    pub property_path: String,

    /// Path of the enclosing embedded object, if nested.
    pub parent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub expression: String,
}

/// Everything known about one mapped entity.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    pub id: EntityId,

    /// Entity name as declared, e.g. `Post`.
    pub name: String,

    pub table: TablePath,
    pub kind: EntityKind,
    pub columns: Vec<Column>,
    pub relations: Vec<Relation>,
    pub embeddeds: Vec<Embedded>,
    pub indices: Vec<Index>,
    pub checks: Vec<Check>,

    pub primary_columns: Vec<ColumnId>,
    pub version_column: Option<ColumnId>,
    pub create_date_column: Option<ColumnId>,
    pub update_date_column: Option<ColumnId>,
    pub delete_date_column: Option<ColumnId>,
    pub discriminator_column: Option<ColumnId>,

    /// Value stored in the discriminator column for rows of this entity.
    pub discriminator_value: Option<String>,

    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,

    /// Ordering applied when a select has no explicit `ORDER BY`.
    pub order_by: Vec<(String, OrderDirection)>,
}

impl EntityMetadata {
    pub fn column(&self, id: ColumnId) -> &Column {
        assert_eq!(id.entity, self.id, "column belongs to another entity");
        &self.columns[id.index]
    }

    pub fn relation(&self, id: RelationId) -> &Relation {
        assert_eq!(id.entity, self.id, "relation belongs to another entity");
        &self.relations[id.index]
    }

    pub fn primary_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.primary_columns.iter().map(|id| &self.columns[id.index])
    }

    pub fn has_multiple_primary_keys(&self) -> bool {
        self.primary_columns.len() > 1
    }

    /// Finds the column for a property path. A relation path with exactly
    /// one join column resolves to that join column.
    pub fn find_column_with_property_path(&self, path: &str) -> Option<&Column> {
        if let Some(column) = self.columns.iter().find(|c| c.property_path == path) {
            return Some(column);
        }

        let relation = self.find_relation_with_property_path(path)?;
        match &relation.join_columns[..] {
            [id] if relation.is_with_join_column() => Some(self.column(*id)),
            _ => None,
        }
    }

    /// Finds every column under a property path: a single column, all join
    /// columns of a relation, or all columns of an embedded object.
    pub fn find_columns_with_property_path(&self, path: &str) -> Vec<&Column> {
        if let Some(column) = self.columns.iter().find(|c| c.property_path == path) {
            return vec![column];
        }

        if let Some(relation) = self.find_relation_with_property_path(path) {
            if relation.is_with_join_column() {
                return relation.join_columns.iter().map(|id| self.column(*id)).collect();
            }
            return vec![];
        }

        let prefix = format!("{path}.");
        self.columns
            .iter()
            .filter(|c| c.property_path.starts_with(&prefix))
            .collect()
    }

    pub fn find_column_with_database_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.database_name == name)
    }

    pub fn find_relation_with_property_path(&self, path: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.property_path == path)
    }

    pub fn find_embedded_with_property_path(&self, path: &str) -> Option<&Embedded> {
        self.embeddeds.iter().find(|e| e.property_path == path)
    }

    pub fn has_relation_with_property_path(&self, path: &str) -> bool {
        self.find_relation_with_property_path(path).is_some()
    }

    pub fn version_column(&self) -> Option<&Column> {
        self.version_column.map(|id| self.column(id))
    }

    pub fn update_date_column(&self) -> Option<&Column> {
        self.update_date_column.map(|id| self.column(id))
    }

    pub fn delete_date_column(&self) -> Option<&Column> {
        self.delete_date_column.map(|id| self.column(id))
    }

    pub fn create_date_column(&self) -> Option<&Column> {
        self.create_date_column.map(|id| self.column(id))
    }

    pub fn discriminator_column(&self) -> Option<&Column> {
        self.discriminator_column.map(|id| self.column(id))
    }

    pub fn is_child(&self) -> bool {
        self.kind == EntityKind::Child
    }

    pub fn is_junction(&self) -> bool {
        self.kind == EntityKind::Junction
    }

    /// Columns that are selected when the whole entity is selected.
    pub fn selectable_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.columns.iter().filter(|c| c.select)
    }
}
