use super::SelectQueryBuilder;
use crate::{
    query::{build_alias, join, lower, raw, AliasKind, AliasTarget, ExpressionMap},
    Result,
};

use keel_core::{
    driver::DatabaseKind,
    schema::{Column, EntityMetadata, TablePath},
    stmt::{Row, Value},
    Registry,
};
use keel_sql::stmt::{
    Distinct, Expr, Func, Limit, Lock, OrderBy, Select, SelectItem, TableRef,
};

use indexmap::IndexMap;

/// Alias of the inner query in the first pagination query.
const DISTINCT_ALIAS: &str = "distinctAlias";

/// Parameter holding the ids found by the first pagination query.
const DISTINCT_IDS: &str = "orm_distinct_ids";

/// How `limit`/`offset` and `skip`/`take` apply to a select, resolved once
/// per build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pagination {
    /// `LIMIT`/`OFFSET` on the SQL rows.
    Raw {
        limit: Option<u64>,
        offset: Option<u64>,
    },

    /// `skip`/`take` counted in main entities; needs a first query for the
    /// ids in the window.
    Entity { skip: Option<u64>, take: Option<u64> },
}

impl SelectQueryBuilder {
    pub(crate) fn pagination(&self) -> Pagination {
        let map = &self.map;

        if (map.skip.is_some() || map.take.is_some()) && map.has_joins() {
            return Pagination::Entity {
                skip: map.skip,
                take: map.take,
            };
        }

        if map.limit.is_none() && map.offset.is_none() {
            Pagination::Raw {
                limit: map.take,
                offset: map.skip,
            }
        } else {
            Pagination::Raw {
                limit: map.limit,
                offset: map.offset,
            }
        }
    }

    /// Lowers the builder into a SELECT plus the parameters it binds.
    pub(crate) fn build_select(&self) -> Result<(Select, IndexMap<String, Value>)> {
        self.map.check()?;

        let db = &self.db;
        let map = &self.map;
        let registry: &Registry = db.registry();
        let mut params = map.parameters.clone();

        let limit = match self.pagination() {
            Pagination::Raw { limit, offset } => Limit { limit, offset },
            Pagination::Entity { .. } => Limit {
                limit: map.limit,
                offset: map.offset,
            },
        };

        let mut joins = vec![];
        for attr in &map.joins {
            joins.extend(join::lower_join(db, map, attr)?);
        }

        let select = Select {
            comment: map.comment.clone(),
            max_execution_time: map.max_execution_time,
            distinct: self.build_distinct(),
            projection: self.build_projection(),
            from: self.build_from(),
            joins,
            filter: lower::where_expression(db, map, &mut params, true)?,
            group_by: map
                .group_bys
                .iter()
                .map(|group| raw::lex(map, registry, group))
                .collect(),
            having: lower::compose(map, registry, &map.havings),
            order_by: self.build_order_by(),
            limit,
            lock: self.build_lock(),
        };

        Ok((select, params))
    }

    fn build_distinct(&self) -> Distinct {
        let map = &self.map;

        if !map.distinct_on.is_empty() {
            let registry = self.db.registry();
            Distinct::On(
                map.distinct_on
                    .iter()
                    .map(|expr| raw::lex(map, registry, expr))
                    .collect(),
            )
        } else if map.distinct {
            Distinct::All
        } else {
            Distinct::None
        }
    }

    fn build_projection(&self) -> Vec<SelectItem> {
        let map = &self.map;
        let registry: &Registry = self.db.registry();
        let max = self.db.max_alias_length();
        let mut items = vec![];

        // Entity columns, aliased `alias_column` so rows can be split back
        // into entities.
        for alias in &map.aliases {
            let Some(metadata) = alias.metadata(registry) else {
                continue;
            };

            for (column, _) in selected_columns(map, registry, &alias.name, metadata) {
                items.push(SelectItem::new(
                    self.column_expr(&alias.name, column),
                    build_alias(max, &[&alias.name, &column.database_name]),
                ));
            }
        }

        for entry in &map.selects {
            if let Some(expr) = &entry.expr {
                items.push(SelectItem {
                    expr: expr.clone(),
                    alias: entry.alias.clone(),
                });
                continue;
            }

            if entry.alias.is_none() && is_entity_selection(map, registry, &entry.selection) {
                continue;
            }

            if let Ok(alias) = map.find_alias(&entry.selection) {
                if !alias.has_metadata() {
                    items.push(SelectItem {
                        expr: Expr::Seq(vec![Expr::Ident(alias.name.clone()), Expr::raw(".*")]),
                        alias: None,
                    });
                    continue;
                }
            }

            items.push(SelectItem {
                expr: raw::lex(map, registry, &entry.selection),
                alias: entry.alias.clone(),
            });
        }

        items
    }

    fn column_expr(&self, alias: &str, column: &Column) -> Expr {
        let expr = Expr::column(alias, &column.database_name);

        if self
            .db
            .capability()
            .spatial_types
            .contains(&column.ty.as_str())
        {
            Expr::Func(Func::SpatialAsText(Box::new(expr)))
        } else {
            expr
        }
    }

    fn build_from(&self) -> Vec<TableRef> {
        let registry = self.db.registry();

        self.map
            .aliases
            .iter()
            .filter(|alias| alias.kind == AliasKind::From)
            .map(|alias| match &alias.target {
                AliasTarget::Entity(id) => {
                    TableRef::table(registry.entity(*id).table.clone(), &alias.name)
                }
                AliasTarget::Table(path) => TableRef::table(path.clone(), &alias.name),
                AliasTarget::Subquery(select) => TableRef::subquery((**select).clone(), &alias.name),
            })
            .collect()
    }

    fn build_order_by(&self) -> Vec<OrderBy> {
        let registry = self.db.registry();

        self.map
            .all_order_bys(registry)
            .iter()
            .map(|(key, entry)| OrderBy {
                expr: order_expr(&self.map, registry, key),
                direction: entry.direction,
                nulls: entry.nulls,
            })
            .collect()
    }

    fn build_lock(&self) -> Option<Lock> {
        let mode = self.map.lock.as_ref()?.sql_mode()?;

        Some(Lock {
            mode,
            on_locked: self.map.on_locked,
            tables: self.map.lock_tables.clone(),
        })
    }

    /// First query of entity pagination: the distinct primary keys of the
    /// main entity inside the `skip`/`take` window, in the requested order.
    pub(crate) fn build_distinct_ids(
        &self,
        skip: Option<u64>,
        take: Option<u64>,
    ) -> Result<(Select, IndexMap<String, Value>)> {
        let (mut inner, params) = self.build_select()?;
        inner.order_by.clear();
        inner.lock = None;

        let map = &self.map;
        let registry: &Registry = self.db.registry();
        let max = self.db.max_alias_length();
        let main = map.main_alias()?;
        let metadata = map.main_metadata(registry)?;

        let mut projection = vec![];
        for pk in metadata.primary_columns() {
            let column_alias = build_alias(max, &[&main.name, &pk.database_name]);
            projection.push(SelectItem::new(
                Expr::column(DISTINCT_ALIAS, &column_alias),
                format!("ids_{column_alias}"),
            ));
        }

        let mut order_by = vec![];
        for (key, entry) in map.all_order_bys(registry) {
            let expr = match selected_column_alias(map, registry, max, &key) {
                Some(column_alias) => Expr::column(DISTINCT_ALIAS, column_alias),
                None if map.selects.iter().any(|s| s.alias.as_deref() == Some(key.as_str())) => {
                    Expr::column(DISTINCT_ALIAS, &key)
                }
                None => raw::lex(map, registry, &key),
            };

            // Postgres requires ordered expressions in a DISTINCT select list.
            if matches!(expr, Expr::Column(_)) && !projection.iter().any(|item| item.expr == expr) {
                projection.push(SelectItem {
                    expr: expr.clone(),
                    alias: None,
                });
            }

            order_by.push(OrderBy {
                expr,
                direction: entry.direction,
                nulls: entry.nulls,
            });
        }

        let select = Select {
            distinct: Distinct::All,
            projection,
            from: vec![TableRef::subquery(inner, DISTINCT_ALIAS)],
            order_by,
            limit: Limit {
                limit: take,
                offset: skip,
            },
            ..Select::default()
        };

        Ok((select, params))
    }

    /// A copy of this builder restricted to the main entities whose ids
    /// the first pagination query returned.
    pub(crate) fn bounded_by(&self, ids: &[Row]) -> Result<SelectQueryBuilder> {
        let registry: &Registry = self.db.registry();
        let max = self.db.max_alias_length();
        let main = self.map.main_alias()?.name.clone();
        let metadata = self.map.main_metadata(registry)?;
        let primary: Vec<&Column> = metadata.primary_columns().collect();

        let key = |pk: &Column| format!("ids_{}", build_alias(max, &[&main, &pk.database_name]));

        let mut bounded = self.clone();

        let condition = if let [pk] = primary[..] {
            let values = ids.iter().map(|row| row.get_or_null(&key(pk)).clone()).collect();
            bounded
                .map
                .parameters
                .insert(DISTINCT_IDS.to_string(), Value::List(values));
            Expr::in_param(join::column_ref(&self.map, &main, pk), DISTINCT_IDS)
        } else {
            let mut alternatives = vec![];
            for (i, row) in ids.iter().enumerate() {
                let mut operands = vec![];
                for (j, pk) in primary.iter().enumerate() {
                    let name = format!("{DISTINCT_IDS}_{i}_{j}");
                    bounded
                        .map
                        .parameters
                        .insert(name.clone(), row.get_or_null(&key(pk)).clone());
                    operands.push(Expr::eq(
                        join::column_ref(&self.map, &main, pk),
                        Expr::param(name),
                    ));
                }
                alternatives.push(Expr::paren(Expr::And(operands)));
            }
            Expr::Or(alternatives)
        };

        bounded.map.extra_condition = Some(condition);
        Ok(bounded)
    }

    /// `SELECT COUNT(..) AS "cnt"` over the same rows, ignoring ordering,
    /// grouping and pagination.
    pub(crate) fn build_count(&self) -> Result<(Select, IndexMap<String, Value>)> {
        let mut counted = self.clone();
        counted.map.order_bys.clear();
        counted.map.group_bys.clear();
        counted.map.limit = None;
        counted.map.offset = None;
        counted.map.skip = None;
        counted.map.take = None;
        counted.map.disable_global_order = true;

        let (mut select, params) = counted.build_select()?;
        select.projection = vec![SelectItem::new(self.count_expr()?, "cnt")];
        select.distinct = Distinct::None;
        select.lock = None;

        Ok((select, params))
    }

    /// `COUNT(1)` when every row is one entity, otherwise a distinct count
    /// of the main entity's primary key.
    fn count_expr(&self) -> Result<Expr> {
        let map = &self.map;

        if !map.has_joins() && map.relation_ids.is_empty() && map.relation_counts.is_empty() {
            return Ok(Expr::Func(Func::CountAll));
        }

        let main = map.main_alias()?;
        let metadata = map.main_metadata(self.db.registry())?;

        Ok(Expr::Func(Func::CountDistinct(
            metadata
                .primary_columns()
                .map(|pk| Expr::column(&main.name, &pk.database_name))
                .collect(),
        )))
    }

    /// `SELECT 1 AS "row_exists" FROM <dummy> WHERE EXISTS (<query>)`.
    pub(crate) fn build_exists(&self) -> Result<(Select, IndexMap<String, Value>)> {
        let (inner, params) = self.build_select()?;

        let from = if self.db.capability().kind == DatabaseKind::Oracle {
            TableRef::table(TablePath::new("DUAL"), "dummy_table")
        } else {
            TableRef::subquery(
                Select {
                    projection: vec![SelectItem::new(Expr::raw("1"), "dummy_column")],
                    ..Select::default()
                },
                "dummy_table",
            )
        };

        let select = Select {
            projection: vec![SelectItem::new(Expr::raw("1"), "row_exists")],
            from: vec![from],
            filter: Some(Expr::Seq(vec![
                Expr::raw("EXISTS "),
                Expr::Subquery(Box::new(inner)),
            ])),
            limit: Limit {
                limit: Some(1),
                offset: None,
            },
            ..Select::default()
        };

        Ok((select, params))
    }
}

/// Columns of `alias` in the projection, each with whether the caller asked
/// for it. Primary columns are always present so rows can be grouped; those
/// the caller did not ask for are marked hidden.
pub(crate) fn selected_columns<'a>(
    map: &ExpressionMap,
    registry: &Registry,
    alias: &str,
    metadata: &'a EntityMetadata,
) -> Vec<(&'a Column, bool)> {
    let whole = map.selects_alias(alias);
    let prefix = format!("{alias}.");
    let paths: Vec<&str> = map
        .selects
        .iter()
        .filter(|entry| entry.alias.is_none() && entry.expr.is_none())
        .filter_map(|entry| entry.selection.strip_prefix(prefix.as_str()))
        .collect();

    if !whole && paths.is_empty() {
        return vec![];
    }

    let mut selected: Vec<(&Column, bool)> = metadata
        .columns
        .iter()
        .filter(|column| {
            (whole && column.select)
                || paths
                    .iter()
                    .any(|path| selects_column(registry, column, path))
        })
        .map(|column| (column, true))
        .collect();

    for pk in metadata.primary_columns() {
        if !selected.iter().any(|(column, _)| column.id == pk.id) {
            selected.push((pk, false));
        }
    }

    selected
}

/// Whether selecting `alias.path` selects `column`: the column itself, an
/// embedded object containing it, or the relation it joins by.
fn selects_column(registry: &Registry, column: &Column, path: &str) -> bool {
    if column.property_path == path {
        return true;
    }

    if column
        .property_path
        .strip_prefix(path)
        .is_some_and(|rest| rest.starts_with('.'))
    {
        return true;
    }

    column
        .relation
        .is_some_and(|id| registry.relation(id).property_path == path)
}

/// Whether a plain select entry is covered by the entity column
/// projection.
fn is_entity_selection(map: &ExpressionMap, registry: &Registry, selection: &str) -> bool {
    let (alias, path) = match selection.split_once('.') {
        Some((alias, path)) => (alias, Some(path)),
        None => (selection, None),
    };

    let Some(metadata) = map
        .find_alias(alias)
        .ok()
        .and_then(|alias| alias.metadata(registry))
    else {
        return false;
    };

    match path {
        None => true,
        Some(path) => metadata
            .columns
            .iter()
            .any(|column| selects_column(registry, column, path)),
    }
}

/// The ORDER BY expression for `key`: a resolvable `alias.property`, a
/// select alias, or SQL.
pub(crate) fn order_expr(map: &ExpressionMap, registry: &Registry, key: &str) -> Expr {
    if let Some((alias, path)) = key.split_once('.') {
        let column = map
            .find_alias(alias)
            .ok()
            .and_then(|alias| alias.metadata(registry))
            .and_then(|metadata| raw::resolve_path(registry, metadata, path));

        if let Some(column) = column {
            return join::column_ref(map, alias, column);
        }
    }

    if map.selects.iter().any(|s| s.alias.as_deref() == Some(key)) {
        return Expr::Ident(key.to_string());
    }

    raw::lex(map, registry, key)
}

/// The projection alias (`alias_column`) an `alias.property` key is read
/// back under.
fn selected_column_alias(
    map: &ExpressionMap,
    registry: &Registry,
    max: Option<usize>,
    key: &str,
) -> Option<String> {
    let (alias, path) = key.split_once('.')?;
    let metadata = map.find_alias(alias).ok()?.metadata(registry)?;
    let column = raw::resolve_path(registry, metadata, path)?;
    Some(build_alias(max, &[alias, &column.database_name]))
}
