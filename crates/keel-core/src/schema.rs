mod builder;
pub use builder::Builder;

mod column;
pub use column::{Column, ColumnId, ColumnMode, Generation};

mod def;
pub use def::{ColumnDef, EmbeddedDef, EntityDef, IndexDef, JoinColumnDef, RelationDef};

mod entity;
pub use entity::{Check, Embedded, EntityId, EntityKind, EntityMetadata, OrderDirection, TablePath};

mod index;
pub use index::Index;

mod naming;
pub use naming::{DefaultNamingStrategy, NamingStrategy};

mod registry;
pub use registry::Registry;

mod relation;
pub use relation::{Relation, RelationId, RelationType};
