//! Entity definitions shared by the integration tests.

use keel::{ColumnDef, EntityDef, OrderDirection, RelationDef};

pub fn author() -> EntityDef {
    EntityDef::new("Author")
        .column(ColumnDef::primary_generated("id"))
        .column(ColumnDef::new("name", "varchar"))
        .relation(RelationDef::one_to_many("articles", "Article", "author"))
}

/// Versioned, soft-deletable, with a many-to-many to `Label`.
pub fn article() -> EntityDef {
    EntityDef::new("Article")
        .column(ColumnDef::primary_generated("id"))
        .column(ColumnDef::new("title", "varchar"))
        .column(ColumnDef::version("version"))
        .column(ColumnDef::delete_date("deletedAt"))
        .relation(RelationDef::many_to_one("author", "Author").inverse("articles"))
        .relation(
            RelationDef::many_to_many("labels", "Label")
                .inverse("articles")
                .join_table(),
        )
}

pub fn label() -> EntityDef {
    EntityDef::new("Label")
        .column(ColumnDef::primary_generated("id"))
        .column(ColumnDef::new("name", "varchar"))
        .relation(RelationDef::many_to_many("articles", "Article").inverse("labels"))
        .order_by("name", OrderDirection::Asc)
}

pub fn all() -> Vec<EntityDef> {
    vec![author(), article(), label()]
}
