use super::{
    attribute::{JoinAttribute, MapTo},
    build_alias, raw, AliasKind, AliasTarget, ExpressionMap,
};
use crate::{Db, Result};

use keel_core::{
    schema::{Column, EntityMetadata, TablePath},
    Error, Registry,
};
use keel_sql::stmt::{Expr, Join, JoinKind, Select, TableRef};

/// What a join reads from.
pub(crate) enum JoinTarget {
    /// An entity name, `parentAlias.relationPath`, or a table path.
    Name(String),

    /// A built sub-query.
    Subquery(Select),
}

/// Resolves `target` and records the join. Relation, entity and junction
/// lookups all happen here, once. Every join needs an alias of its own.
pub(crate) fn add_join(
    db: &Db,
    map: &mut ExpressionMap,
    kind: JoinKind,
    target: JoinTarget,
    alias: &str,
    condition: Option<String>,
    map_to: Option<(&str, bool)>,
) -> Result<()> {
    let registry = db.registry();

    if map.has_alias(alias) {
        return Err(Error::invalid_parameter(
            alias,
            "alias is already declared in this query",
        ));
    }

    let map_to = match map_to {
        Some((path, many)) => Some(parse_map_to(path, many)?),
        None => None,
    };

    let mut join = JoinAttribute {
        kind,
        alias: alias.to_string(),
        entity: None,
        parent_alias: None,
        relation: None,
        junction_alias: None,
        condition,
        map_to,
    };

    let target = match target {
        JoinTarget::Subquery(select) => AliasTarget::Subquery(Box::new(select)),
        JoinTarget::Name(name) => {
            if let Some(entity) = registry.get(&name) {
                join.entity = Some(entity.id);
                AliasTarget::Entity(entity.id)
            } else if let Some((parent, path)) = relation_reference(map, &name) {
                let parent_metadata = map
                    .find_alias(parent)?
                    .metadata(registry)
                    .ok_or_else(|| Error::relation_not_found(parent, path))?;

                let relation = parent_metadata
                    .find_relation_with_property_path(path)
                    .ok_or_else(|| Error::relation_not_found(&parent_metadata.name, path))?;

                if let Some(junction) = relation.junction {
                    let base = if relation.is_owning {
                        build_alias(db.max_alias_length(), &[parent, alias])
                    } else {
                        build_alias(db.max_alias_length(), &[alias, parent])
                    };
                    let junction_alias = unique_alias(map, base);
                    map.create_alias(
                        AliasKind::Join,
                        junction_alias.clone(),
                        AliasTarget::Entity(junction),
                    );
                    join.junction_alias = Some(junction_alias);
                }

                join.parent_alias = Some(parent.to_string());
                join.relation = Some(relation.id);
                join.entity = Some(relation.target);
                AliasTarget::Entity(relation.target)
            } else {
                AliasTarget::Table(TablePath::parse(&name))
            }
        }
    };

    map.create_alias(AliasKind::Join, alias, target);
    map.joins.push(join);
    Ok(())
}

/// `parent.path` when `parent` is a declared alias.
fn relation_reference<'a>(map: &ExpressionMap, name: &'a str) -> Option<(&'a str, &'a str)> {
    let (parent, path) = name.split_once('.')?;
    map.has_alias(parent).then_some((parent, path))
}

/// Appends `_1`, `_2`, ... until the alias is free.
fn unique_alias(map: &ExpressionMap, base: String) -> String {
    if !map.has_alias(&base) {
        return base;
    }

    let mut n = 1;
    loop {
        let candidate = format!("{base}_{n}");
        if !map.has_alias(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// `parent.property` of a `*_and_map_one` / `*_and_map_many` join.
fn parse_map_to(path: &str, many: bool) -> Result<MapTo> {
    let (parent, property) = path
        .split_once('.')
        .ok_or_else(|| Error::invalid_parameter(path, "map target must be `alias.property`"))?;

    Ok(MapTo {
        parent_alias: parent.to_string(),
        property: property.to_string(),
        many,
    })
}

/// Lowers one join into the SQL joins it needs: one, or two for a
/// many-to-many relation (junction first).
pub(crate) fn lower_join(db: &Db, map: &ExpressionMap, join: &JoinAttribute) -> Result<Vec<Join>> {
    let registry: &Registry = db.registry();
    let alias = map.find_alias(&join.alias)?;

    let table = match &alias.target {
        AliasTarget::Entity(id) => TableRef::table(registry.entity(*id).table.clone(), &join.alias),
        AliasTarget::Table(path) => TableRef::table(path.clone(), &join.alias),
        AliasTarget::Subquery(select) => TableRef::subquery((**select).clone(), &join.alias),
    };

    let mut on = vec![];
    let mut joins = vec![];

    if let (Some(relation_id), Some(parent)) = (join.relation, &join.parent_alias) {
        let relation = registry.relation(relation_id);
        let dest = join.alias.as_str();

        if relation.is_with_join_column() {
            for column in relation.join_columns.iter().map(|id| registry.column(*id)) {
                on.push(Expr::eq(
                    Expr::column(dest, &referenced(registry, column)?.database_name),
                    Expr::column(parent, &column.database_name),
                ));
            }
        } else if relation.is_many_to_many() {
            let junction_alias = join
                .junction_alias
                .as_deref()
                .ok_or_else(|| keel_core::err!("junction alias missing for {dest}"))?;
            let junction_id = relation
                .junction
                .ok_or_else(|| keel_core::err!("relation {} has no junction", relation.property_path))?;
            let junction = registry.entity(junction_id);

            let junction_on = relation
                .join_columns
                .iter()
                .map(|id| registry.column(*id))
                .map(|column| {
                    Ok(Expr::eq(
                        Expr::column(junction_alias, &column.database_name),
                        Expr::column(parent, &referenced(registry, column)?.database_name),
                    ))
                })
                .collect::<Result<Vec<_>>>()?;

            joins.push(Join {
                kind: join.kind,
                table: TableRef::table(junction.table.clone(), junction_alias),
                on: Some(Expr::and_from_vec(junction_on)),
            });

            for column in relation.inverse_join_columns.iter().map(|id| registry.column(*id)) {
                on.push(Expr::eq(
                    Expr::column(dest, &referenced(registry, column)?.database_name),
                    Expr::column(junction_alias, &column.database_name),
                ));
            }
        } else {
            let inverse = registry.inverse(relation).ok_or_else(|| {
                Error::relation_not_found(
                    &registry.entity(relation_id.entity).name,
                    &relation.property_path,
                )
            })?;

            for column in inverse.join_columns.iter().map(|id| registry.column(*id)) {
                on.push(Expr::eq(
                    Expr::column(dest, &column.database_name),
                    Expr::column(parent, &referenced(registry, column)?.database_name),
                ));
            }
        }
    }

    if let Some(condition) = &join.condition {
        let expr = raw::lex(map, registry, condition);
        if !expr.is_empty_raw() {
            on.push(expr);
        }
    }

    if let Some(metadata) = alias.metadata(registry) {
        if let Some(filter) = soft_delete_filter(map, metadata, &join.alias) {
            on.push(filter);
        }
    }

    let on = match on.len() {
        0 => None,
        1 => on.pop(),
        _ => Some(Expr::And(
            on.into_iter()
                .map(|expr| match expr {
                    Expr::Seq(_) => Expr::paren(expr),
                    expr => expr,
                })
                .collect(),
        )),
    };

    joins.push(Join {
        kind: join.kind,
        table,
        on,
    });

    Ok(joins)
}

/// `alias.deletedAt IS NULL` unless deleted rows were requested.
pub(crate) fn soft_delete_filter(
    map: &ExpressionMap,
    metadata: &EntityMetadata,
    alias: &str,
) -> Option<Expr> {
    if map.with_deleted {
        return None;
    }

    let column = metadata.delete_date_column()?;
    Some(Expr::is_null(column_ref(map, alias, column)))
}

/// The column a join column points at.
pub(crate) fn referenced<'a>(registry: &'a Registry, column: &Column) -> Result<&'a Column> {
    column
        .referenced_column
        .map(|id| registry.column(id))
        .ok_or_else(|| Error::entity_column_not_found(&column.property_path))
}

/// `alias.column`, or the bare column when aliases are not prefixed.
pub(crate) fn column_ref(map: &ExpressionMap, alias: &str, column: &Column) -> Expr {
    if map.alias_prefixing {
        Expr::column(alias, &column.database_name)
    } else {
        Expr::bare_column(&column.database_name)
    }
}
