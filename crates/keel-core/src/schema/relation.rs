use super::{ColumnId, EntityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId {
    pub entity: EntityId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// A relation from one entity to another.
///
/// Owning sides hold the join columns. For an owning many-to-many relation
/// `join_columns` are the junction columns pointing back at the owner and
/// `inverse_join_columns` the ones pointing at the target; the inverse side
/// carries the same columns swapped.
#[derive(Debug, Clone)]
pub struct Relation {
    pub id: RelationId,
    pub property_name: String,
    pub property_path: String,
    pub ty: RelationType,
    pub target: EntityId,
    pub inverse: Option<RelationId>,
    pub is_owning: bool,
    pub nullable: bool,
    pub join_columns: Vec<ColumnId>,
    pub inverse_join_columns: Vec<ColumnId>,
    pub junction: Option<EntityId>,
}

impl Relation {
    pub fn is_many_to_one(&self) -> bool {
        self.ty == RelationType::ManyToOne
    }

    pub fn is_one_to_many(&self) -> bool {
        self.ty == RelationType::OneToMany
    }

    pub fn is_many_to_many(&self) -> bool {
        self.ty == RelationType::ManyToMany
    }

    pub fn is_one_to_one(&self) -> bool {
        self.ty == RelationType::OneToOne
    }

    pub fn is_one_to_one_owner(&self) -> bool {
        self.is_one_to_one() && self.is_owning
    }

    pub fn is_one_to_one_not_owner(&self) -> bool {
        self.is_one_to_one() && !self.is_owning
    }

    /// Many-to-one or owning one-to-one: the foreign key lives on this entity.
    pub fn is_with_join_column(&self) -> bool {
        self.is_many_to_one() || self.is_one_to_one_owner()
    }

    /// The relation resolves to a list of entities.
    pub fn is_to_many(&self) -> bool {
        self.is_one_to_many() || self.is_many_to_many()
    }
}
