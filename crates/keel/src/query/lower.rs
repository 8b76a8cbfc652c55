use super::{
    build_alias,
    condition::{StoredCondition, WhereClause, WhereKind},
    join::{self, JoinTarget},
    raw, EntityRef, ExpressionMap, Where, WhereValue,
};
use crate::{Db, Result};

use keel_core::{
    schema::{Column, EntityMetadata, Relation},
    stmt::{FindOperator, OperatorKind, RawSql, Value},
    Error, Registry,
};
use keel_sql::stmt::{BinaryOp, Expr, Func, JoinKind, Select, SelectItem, TableRef};

use indexmap::IndexMap;

/// Lowers object-style conditions against the main alias, binding values
/// as generated parameters and adding the joins nested relation
/// conditions need.
pub(crate) struct Lowering<'a> {
    db: &'a Db,
    map: &'a mut ExpressionMap,
}

impl<'a> Lowering<'a> {
    pub(crate) fn new(db: &'a Db, map: &'a mut ExpressionMap) -> Lowering<'a> {
        Lowering { db, map }
    }

    fn registry(&self) -> &'a Registry {
        let db: &'a Db = self.db;
        db.registry()
    }

    /// Several maps are OR'ed; the conditions of one map are AND'ed.
    pub(crate) fn where_list(&mut self, wheres: &[Where]) -> Result<Expr> {
        let alias = self.map.main_alias()?.name.clone();
        let metadata = self.map.main_metadata(self.registry())?;

        let mut alternatives = vec![];
        for w in wheres {
            let conditions = self.where_map(&alias, metadata, "", w)?;
            match conditions.len() {
                0 => {}
                1 => alternatives.extend(conditions),
                _ => alternatives.push(Expr::paren(Expr::And(conditions))),
            }
        }

        Ok(match alternatives.len() {
            0 => Expr::raw("1=1"),
            1 => alternatives.remove(0),
            _ => Expr::paren(Expr::Or(alternatives)),
        })
    }

    /// `pk IN (...)` for single keys, an OR of per-entity key matches for
    /// composite keys.
    pub(crate) fn where_in_ids(&mut self, ids: &[EntityRef]) -> Result<Expr> {
        let metadata = self.map.main_metadata(self.registry())?;
        let wheres = ids_to_wheres(metadata, ids)?;
        self.where_list(&wheres)
    }

    fn where_map(
        &mut self,
        alias: &str,
        metadata: &'a EntityMetadata,
        prefix: &str,
        w: &Where,
    ) -> Result<Vec<Expr>> {
        let mut conditions = vec![];

        for (key, value) in w.iter() {
            let path = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{prefix}.{key}")
            };

            if let (Some(_), WhereValue::Nested(nested)) =
                (metadata.find_embedded_with_property_path(&path), value)
            {
                conditions.extend(self.where_map(alias, metadata, &path, nested)?);
            } else if let Some(relation) = metadata.find_relation_with_property_path(&path) {
                if let Some(expr) = self.relation_condition(alias, relation, value)? {
                    conditions.push(expr);
                }
            } else if let Some(column) = metadata.columns.iter().find(|c| c.property_path == path)
            {
                let lhs = join::column_ref(self.map, alias, column);
                conditions.push(self.column_condition(lhs, column, value)?);
            } else {
                return Err(Error::entity_column_not_found(format!("{alias}.{path}")));
            }
        }

        Ok(conditions)
    }

    fn column_condition(&mut self, lhs: Expr, column: &Column, value: &WhereValue) -> Result<Expr> {
        match value {
            WhereValue::Value(Value::Null) => Ok(Expr::is_null(lhs)),
            WhereValue::Value(value) => {
                let param = self.map.create_parameter(value.clone());
                Ok(Expr::eq(lhs, Expr::Param(param)))
            }
            WhereValue::Operator(op) => self.operator(lhs, op),
            WhereValue::Nested(_) => Err(Error::entity_column_not_found(format!(
                "{}.*",
                column.property_path
            ))),
        }
    }

    fn relation_condition(
        &mut self,
        alias: &str,
        relation: &'a Relation,
        value: &WhereValue,
    ) -> Result<Option<Expr>> {
        let registry = self.registry();

        match value {
            WhereValue::Value(Value::Null) => {
                if relation.is_with_join_column() {
                    let checks = relation
                        .join_columns
                        .iter()
                        .map(|id| Expr::is_null(join::column_ref(self.map, alias, registry.column(*id))))
                        .collect();
                    return Ok(Some(Expr::and_from_vec(checks)));
                }

                // No foreign key on this side: left join and look for a
                // missing target row.
                let join_alias = self.relation_join(alias, relation)?;
                let target = registry.target(relation);
                let checks = target
                    .primary_columns()
                    .map(|column| Expr::is_null(Expr::column(&join_alias, &column.database_name)))
                    .collect();
                Ok(Some(Expr::and_from_vec(checks)))
            }
            WhereValue::Operator(op) if relation.is_to_many() => {
                self.count_condition(alias, relation, op).map(Some)
            }
            WhereValue::Value(_) | WhereValue::Operator(_) => {
                match &relation.join_columns[..] {
                    [id] if relation.is_with_join_column() => {
                        let column = registry.column(*id);
                        let lhs = join::column_ref(self.map, alias, column);
                        self.column_condition(lhs, column, value).map(Some)
                    }
                    _ => Err(Error::entity_column_not_found(format!(
                        "{alias}.{}",
                        relation.property_path
                    ))),
                }
            }
            WhereValue::Nested(nested) => {
                if let Some(expr) = self.join_column_shortcut(alias, relation, nested)? {
                    return Ok(Some(expr));
                }

                let join_alias = self.relation_join(alias, relation)?;
                let target = registry.target(relation);
                let conditions = self.where_map(&join_alias, target, "", nested)?;
                Ok(match conditions.len() {
                    0 => None,
                    1 => conditions.into_iter().next(),
                    _ => Some(Expr::paren(Expr::And(conditions))),
                })
            }
        }
    }

    /// `{author: {id: 1}}` reads the foreign key on this side instead of
    /// joining the target.
    fn join_column_shortcut(
        &mut self,
        alias: &str,
        relation: &Relation,
        nested: &Where,
    ) -> Result<Option<Expr>> {
        if !relation.is_with_join_column() || nested.is_empty() {
            return Ok(None);
        }

        let registry = self.registry();
        let mut pairs = vec![];

        for (key, value) in nested.iter() {
            if !matches!(value, WhereValue::Value(_) | WhereValue::Operator(_)) {
                return Ok(None);
            }

            let column = relation
                .join_columns
                .iter()
                .map(|id| registry.column(*id))
                .find(|column| {
                    column
                        .referenced_column
                        .is_some_and(|id| registry.column(id).property_path == key)
                });

            match column {
                Some(column) => pairs.push((column, value)),
                None => return Ok(None),
            }
        }

        let mut conditions = vec![];
        for (column, value) in pairs {
            let lhs = join::column_ref(self.map, alias, column);
            conditions.push(self.column_condition(lhs, column, value)?);
        }

        Ok(Some(match conditions.len() {
            1 => conditions.remove(0),
            _ => Expr::paren(Expr::And(conditions)),
        }))
    }

    /// Left-joins `relation` for a nested condition, reusing the join when
    /// an earlier condition added it.
    fn relation_join(&mut self, alias: &str, relation: &Relation) -> Result<String> {
        let name = self.db.naming().join_relation_alias(alias, &relation.property_path);
        let join_alias = build_alias(self.db.max_alias_length(), &[&name]);

        if !self.map.has_alias(&join_alias) {
            join::add_join(
                self.db,
                self.map,
                JoinKind::Left,
                JoinTarget::Name(format!("{alias}.{}", relation.property_path)),
                &join_alias,
                None,
                None,
            )?;
        }

        Ok(join_alias)
    }

    /// `(SELECT COUNT(1) FROM child WHERE child.fk = alias.pk) op value`
    /// for operators applied to a to-many relation.
    fn count_condition(&mut self, alias: &str, relation: &Relation, op: &FindOperator) -> Result<Expr> {
        let registry = self.registry();

        let (table, links) = if let Some(junction) = relation.junction {
            let junction = registry.entity(junction);
            let links = relation
                .join_columns
                .iter()
                .map(|id| registry.column(*id))
                .map(|column| {
                    Ok(Expr::eq(
                        Expr::column(&junction.table.table, &column.database_name),
                        join::column_ref(self.map, alias, join::referenced(registry, column)?),
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            (junction.table.clone(), links)
        } else {
            let inverse = registry.inverse(relation).ok_or_else(|| {
                Error::relation_not_found(&registry.entity(relation.id.entity).name, &relation.property_path)
            })?;
            let target = registry.target(relation);
            let links = inverse
                .join_columns
                .iter()
                .map(|id| registry.column(*id))
                .map(|column| {
                    Ok(Expr::eq(
                        Expr::column(&target.table.table, &column.database_name),
                        join::column_ref(self.map, alias, join::referenced(registry, column)?),
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            (target.table.clone(), links)
        };

        let count = Select {
            projection: vec![SelectItem {
                expr: Expr::Func(Func::CountAll),
                alias: None,
            }],
            from: vec![TableRef {
                source: keel_sql::stmt::TableSource::Table(table),
                alias: None,
            }],
            filter: Some(Expr::and_from_vec(links)),
            ..Select::default()
        };

        let counted = Expr::Subquery(Box::new(count));
        match op.kind() {
            OperatorKind::LessThan
            | OperatorKind::LessThanOrEqual
            | OperatorKind::MoreThan
            | OperatorKind::MoreThanOrEqual
            | OperatorKind::Equal
            | OperatorKind::Not
            | OperatorKind::Between
            | OperatorKind::In => self.operator(counted, op),
            kind => Err(Error::unsupported_feature(format!(
                "{kind:?} cannot be applied to the to-many relation {}",
                relation.property_path
            ))),
        }
    }

    /// Lowers `op` applied to `lhs`.
    fn operator(&mut self, lhs: Expr, op: &FindOperator) -> Result<Expr> {
        match op.kind() {
            OperatorKind::Not => match op.child() {
                Some(child) if child.kind() == OperatorKind::Equal => {
                    self.compare(lhs, BinaryOp::Ne, child)
                }
                Some(child) => Ok(Expr::not(self.operator(lhs, child)?)),
                None => match op.value() {
                    Some(Value::Null) | None => Ok(Expr::IsNull(Box::new(lhs), true)),
                    Some(_) => self.compare(lhs, BinaryOp::Ne, op),
                },
            },
            OperatorKind::LessThan => self.compare(lhs, BinaryOp::Lt, op),
            OperatorKind::LessThanOrEqual => self.compare(lhs, BinaryOp::Le, op),
            OperatorKind::MoreThan => self.compare(lhs, BinaryOp::Gt, op),
            OperatorKind::MoreThanOrEqual => self.compare(lhs, BinaryOp::Ge, op),
            OperatorKind::Equal => match op.value() {
                Some(Value::Null) | None => Ok(Expr::is_null(lhs)),
                Some(_) => self.compare(lhs, BinaryOp::Eq, op),
            },
            OperatorKind::Like | OperatorKind::ILike => {
                let pattern = self.bind(op)?;
                Ok(Expr::Like {
                    expr: Box::new(lhs),
                    pattern: Box::new(pattern),
                    case_insensitive: op.kind() == OperatorKind::ILike,
                })
            }
            OperatorKind::Between => {
                let (low, high) = match op.value().and_then(Value::as_list) {
                    Some([low, high]) => (low.clone(), high.clone()),
                    _ => {
                        return Err(Error::invalid_parameter(
                            "between",
                            "expects exactly two values",
                        ))
                    }
                };
                let low = self.map.create_parameter(low);
                let high = self.map.create_parameter(high);
                Ok(Expr::Between(
                    Box::new(lhs),
                    Box::new(Expr::Param(low)),
                    Box::new(Expr::Param(high)),
                ))
            }
            OperatorKind::In => {
                let items = op
                    .value()
                    .cloned()
                    .map(Value::into_items)
                    .unwrap_or_default();
                let params = items
                    .into_iter()
                    .map(|item| Expr::Param(self.map.create_parameter(item)))
                    .collect();
                Ok(Expr::InList(Box::new(lhs), params))
            }
            OperatorKind::Any => {
                let list = op.value().cloned().unwrap_or(Value::List(vec![]));
                let param = self.map.create_parameter(list);
                let rhs = if self.db.capability().kind.is_postgres_family() {
                    Expr::Param(param)
                } else {
                    Expr::ParamList(param)
                };
                Ok(Expr::Any(Box::new(lhs), Box::new(rhs)))
            }
            OperatorKind::IsNull => Ok(Expr::is_null(lhs)),
            OperatorKind::Raw => self.raw(lhs, op),
        }
    }

    fn compare(&mut self, lhs: Expr, op: BinaryOp, operator: &FindOperator) -> Result<Expr> {
        let rhs = self.bind(operator)?;
        Ok(Expr::binary_op(lhs, op, rhs))
    }

    fn bind(&mut self, op: &FindOperator) -> Result<Expr> {
        let value = op
            .value()
            .cloned()
            .ok_or_else(|| Error::invalid_parameter(format!("{:?}", op.kind()), "operator has no value"))?;
        Ok(Expr::Param(self.map.create_parameter(value)))
    }

    /// Raw text is compared with `=`; a raw closure receives the escaped
    /// column and produces the whole condition.
    fn raw(&mut self, lhs: Expr, op: &FindOperator) -> Result<Expr> {
        let (sql, params) = op
            .raw_sql()
            .ok_or_else(|| Error::invalid_parameter("raw", "operator has no SQL"))?;

        for (name, value) in params {
            self.map.set_parameter(name, value.clone())?;
        }

        let registry = self.registry();
        match sql {
            RawSql::Text(text) => {
                let rhs = raw::lex(self.map, registry, text);
                Ok(Expr::Seq(vec![lhs, Expr::raw(" = "), rhs]))
            }
            RawSql::Fn(_) => {
                let column = self.column_text(&lhs);
                Ok(raw::lex(self.map, registry, &sql.render(&column)))
            }
        }
    }

    /// The escaped text of a column reference, as handed to raw closures.
    fn column_text(&self, expr: &Expr) -> String {
        match expr {
            Expr::Column(column) => match &column.table {
                Some(table) => format!("{}.{}", self.db.escape(table), self.db.escape(&column.name)),
                None => self.db.escape(&column.name),
            },
            _ => String::new(),
        }
    }
}

/// One where map per entity for composite keys; a single `IN` map
/// otherwise.
fn ids_to_wheres(metadata: &EntityMetadata, ids: &[EntityRef]) -> Result<Vec<Where>> {
    let primary: Vec<&Column> = metadata.primary_columns().collect();

    if let [pk] = &primary[..] {
        let values = ids
            .iter()
            .map(|id| {
                id.property(&pk.property_path)
                    .cloned()
                    .ok_or_else(|| Error::entity_column_not_found(&pk.property_path))
            })
            .collect::<Result<Vec<_>>>()?;

        return Ok(vec![Where::new().set(
            pk.property_path.clone(),
            keel_core::stmt::in_list(values),
        )]);
    }

    ids.iter()
        .map(|id| match id {
            EntityRef::Id(_) => Err(Error::invalid_parameter(
                &metadata.name,
                "has a composite primary key; identify entities with objects",
            )),
            EntityRef::Object(row) => {
                let mut w = Where::new();
                for pk in &primary {
                    let value = row
                        .get(&pk.property_path)
                        .cloned()
                        .ok_or_else(|| Error::entity_column_not_found(&pk.property_path))?;
                    w = w.set(pk.property_path.clone(), value);
                }
                Ok(w)
            }
        })
        .collect()
}

/// Renders a where (or having) list: `a AND b OR c`. Groups become
/// `(...)` or `NOT(...)`.
pub(crate) fn compose(map: &ExpressionMap, registry: &Registry, clauses: &[WhereClause]) -> Option<Expr> {
    let mut parts = vec![];

    for clause in clauses {
        let expr = match &clause.condition {
            StoredCondition::Raw(sql) => raw::lex(map, registry, sql),
            StoredCondition::Expr(expr) => expr.clone(),
            StoredCondition::Group { wheres, negate } => {
                let inner = compose(map, registry, wheres).unwrap_or_else(|| Expr::raw("1=1"));
                if *negate {
                    Expr::not(inner)
                } else {
                    Expr::paren(inner)
                }
            }
        };

        if expr.is_empty_raw() || expr == Expr::raw("1=1") {
            continue;
        }

        if !parts.is_empty() {
            parts.push(Expr::raw(match clause.kind {
                WhereKind::Or => " OR ",
                WhereKind::And | WhereKind::Simple => " AND ",
            }));
        }
        parts.push(expr);
    }

    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Expr::Seq(parts)),
    }
}

/// The full WHERE expression: user conditions, the soft-delete filter, the
/// inheritance discriminator and any extra condition, each parenthesized
/// when there is more than one.
///
/// Parameters the expression needs beyond the map's own are added to
/// `params`.
pub(crate) fn where_expression(
    db: &Db,
    map: &ExpressionMap,
    params: &mut IndexMap<String, Value>,
    soft_delete: bool,
) -> Result<Option<Expr>> {
    let registry: &Registry = db.registry();
    let mut conditions = vec![];

    if let Some(user) = compose(map, registry, &map.wheres) {
        conditions.push(user);
    }

    if let Ok(alias) = map.main_alias() {
        if let Some(metadata) = alias.metadata(registry) {
            if soft_delete {
                if let Some(filter) = join::soft_delete_filter(map, metadata, &alias.name) {
                    conditions.push(filter);
                }
            }

            if metadata.is_child() {
                if let Some(column) = metadata.discriminator_column() {
                    let values: Vec<Value> = std::iter::once(metadata)
                        .chain(registry.child_entities(metadata))
                        .filter_map(|entity| entity.discriminator_value.clone())
                        .map(Value::from)
                        .collect();
                    params.insert("discriminatorColumnValues".to_string(), Value::List(values));
                    conditions.push(Expr::in_param(
                        join::column_ref(map, &alias.name, column),
                        "discriminatorColumnValues",
                    ));
                }
            }
        }
    }

    if let Some(extra) = &map.extra_condition {
        conditions.push(extra.clone());
    }

    Ok(match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(Expr::And(conditions.into_iter().map(Expr::paren).collect())),
    })
}

#[cfg(test)]
mod tests;
