mod build;
pub(crate) use build::{order_expr, selected_columns};

mod exec;

use super::{
    alias::AliasTarget,
    attribute::{RelationCountAttribute, RelationIdAttribute},
    builder::push_condition,
    condition::WhereKind,
    expression_map::{OrderEntry, SelectEntry},
    join::{self, JoinTarget},
    AliasKind, Condition, ExpressionMap, QueryBuilder, QueryType, WhereExpressionBuilder,
};
use crate::{Db, Result};

use keel_core::{
    driver::QueryRunner,
    schema::{OrderDirection, TablePath},
    stmt::Value,
    Error,
};
use keel_sql::{
    stmt::{self, Expr, JoinKind, Nulls, OnLocked},
    Statement,
};

use indexmap::IndexMap;
use std::{sync::Arc, time::Duration};

/// How the rows of a select are locked.
#[derive(Debug, Clone, PartialEq)]
pub enum LockMode {
    /// Check, after loading, that the entity's version (a version number or
    /// an update date) still equals the given one.
    Optimistic(Value),
    PessimisticRead,
    PessimisticWrite,
    DirtyRead,
    PessimisticPartialWrite,
    PessimisticWriteOrFail,
    ForNoKeyUpdate,
    ForKeyShare,
}

impl LockMode {
    pub fn is_optimistic(&self) -> bool {
        matches!(self, LockMode::Optimistic(_))
    }

    /// Pessimistic modes hold row locks and need a transaction.
    pub fn is_pessimistic(&self) -> bool {
        !matches!(self, LockMode::Optimistic(_) | LockMode::DirtyRead)
    }

    pub(crate) fn sql_mode(&self) -> Option<stmt::LockMode> {
        Some(match self {
            LockMode::Optimistic(_) => return None,
            LockMode::PessimisticRead => stmt::LockMode::PessimisticRead,
            LockMode::PessimisticWrite => stmt::LockMode::PessimisticWrite,
            LockMode::DirtyRead => stmt::LockMode::DirtyRead,
            LockMode::PessimisticPartialWrite => stmt::LockMode::PessimisticPartialWrite,
            LockMode::PessimisticWriteOrFail => stmt::LockMode::PessimisticWriteOrFail,
            LockMode::ForNoKeyUpdate => stmt::LockMode::ForNoKeyUpdate,
            LockMode::ForKeyShare => stmt::LockMode::ForKeyShare,
        })
    }
}

/// Builds and runs SELECT queries.
///
/// ```no_run
/// # async fn example(db: keel::Db) -> keel::Result<()> {
/// use keel::prelude::*;
///
/// let posts = db
///     .select("Post", "post")
///     .left_join_and_select("post.categories", "category")
///     .where_("post.title = :title")
///     .set_parameter("title", "Hello")
///     .order_by("post.id", OrderDirection::Desc)
///     .take(10)
///     .get_many()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SelectQueryBuilder {
    pub(crate) db: Db,
    pub(crate) map: ExpressionMap,
    pub(crate) runner: Option<Arc<dyn QueryRunner>>,
}

impl SelectQueryBuilder {
    pub(crate) fn new(db: Db) -> SelectQueryBuilder {
        SelectQueryBuilder {
            db,
            map: ExpressionMap::new(QueryType::Select),
            runner: None,
        }
    }

    /// A fresh builder for a sub-query of this one. It continues this
    /// builder's parameter numbering so the two never bind the same
    /// generated name.
    pub fn sub_query(&self) -> SelectQueryBuilder {
        let mut map = ExpressionMap::new(QueryType::Select);
        map.parameters = self.map.parameters.clone();
        map.param_index = self.map.param_index;

        SelectQueryBuilder {
            db: self.db.clone(),
            map,
            runner: None,
        }
    }

    /// Replaces the select list with `selection`: an alias (the whole
    /// entity), `alias.property`, or SQL.
    pub fn select(mut self, selection: &str) -> Self {
        self.map.selects.clear();
        self.add_select_entry(selection, None)
    }

    pub fn select_as(mut self, selection: &str, alias: &str) -> Self {
        self.map.selects.clear();
        self.add_select_entry(selection, Some(alias))
    }

    pub fn add_select(self, selection: &str) -> Self {
        self.add_select_entry(selection, None)
    }

    pub fn add_select_as(self, selection: &str, alias: &str) -> Self {
        self.add_select_entry(selection, Some(alias))
    }

    /// Selects the result of a scalar sub-query as `alias`.
    pub fn add_select_sub_query(
        mut self,
        f: impl FnOnce(SelectQueryBuilder) -> SelectQueryBuilder,
        alias: &str,
    ) -> Self {
        if let Some(select) = self.build_sub_query(f) {
            self.map.selects.push(SelectEntry {
                selection: alias.to_string(),
                alias: Some(alias.to_string()),
                expr: Some(Expr::Subquery(Box::new(select))),
            });
        }
        self
    }

    fn add_select_entry(mut self, selection: &str, alias: Option<&str>) -> Self {
        self.map.selects.push(SelectEntry {
            selection: selection.trim().to_string(),
            alias: alias.map(str::to_string),
            expr: None,
        });
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.map.distinct = distinct;
        self
    }

    /// `DISTINCT ON (...)`, Postgres-family only.
    pub fn distinct_on<S: Into<String>>(mut self, exprs: impl IntoIterator<Item = S>) -> Self {
        self.map.distinct_on = exprs.into_iter().map(Into::into).collect();
        self
    }

    /// Reads from entity (or table) `target` under `alias`, which becomes
    /// the main alias.
    pub fn from(mut self, target: &str, alias: &str) -> Self {
        let target = self.resolve_target(target);
        self.map.create_alias(AliasKind::From, alias, target);
        self.map.main_alias = Some(alias.to_string());
        self
    }

    /// Adds another source to the FROM list without changing the main
    /// alias.
    pub fn add_from(mut self, target: &str, alias: &str) -> Self {
        let target = self.resolve_target(target);
        self.map.create_alias(AliasKind::From, alias, target);
        if self.map.main_alias.is_none() {
            self.map.main_alias = Some(alias.to_string());
        }
        self
    }

    /// Reads from a sub-query under `alias`.
    pub fn from_sub_query(
        mut self,
        f: impl FnOnce(SelectQueryBuilder) -> SelectQueryBuilder,
        alias: &str,
    ) -> Self {
        if let Some(select) = self.build_sub_query(f) {
            self.map
                .create_alias(AliasKind::From, alias, AliasTarget::Subquery(Box::new(select)));
            self.map.main_alias = Some(alias.to_string());
        }
        self
    }

    fn resolve_target(&self, target: &str) -> AliasTarget {
        match self.db.registry().get(target) {
            Some(entity) => AliasTarget::Entity(entity.id),
            None => AliasTarget::Table(TablePath::parse(target)),
        }
    }

    /// Builds a sub-query against this builder's parameters and takes its
    /// parameters back. Errors are recorded on this builder.
    fn build_sub_query(
        &mut self,
        f: impl FnOnce(SelectQueryBuilder) -> SelectQueryBuilder,
    ) -> Option<stmt::Select> {
        let sub = f(self.sub_query());
        let built = sub.build_select();
        self.map.merge_parameters(&sub.map);

        match built {
            Ok((select, _)) => Some(select),
            Err(err) => {
                self.map.fail(err);
                None
            }
        }
    }

    // ===== Joins =====

    /// `INNER JOIN`s `target`: an entity name, `alias.relation`, or a table.
    pub fn inner_join(self, target: &str, alias: &str) -> Self {
        self.join(JoinKind::Inner, target, alias, None, false, None)
    }

    pub fn inner_join_on(self, target: &str, alias: &str, condition: &str) -> Self {
        self.join(JoinKind::Inner, target, alias, Some(condition), false, None)
    }

    pub fn left_join(self, target: &str, alias: &str) -> Self {
        self.join(JoinKind::Left, target, alias, None, false, None)
    }

    pub fn left_join_on(self, target: &str, alias: &str, condition: &str) -> Self {
        self.join(JoinKind::Left, target, alias, Some(condition), false, None)
    }

    /// Joins and selects `target`, hydrating it onto its relation property.
    pub fn inner_join_and_select(self, target: &str, alias: &str) -> Self {
        self.join(JoinKind::Inner, target, alias, None, true, None)
    }

    pub fn inner_join_and_select_on(self, target: &str, alias: &str, condition: &str) -> Self {
        self.join(JoinKind::Inner, target, alias, Some(condition), true, None)
    }

    pub fn left_join_and_select(self, target: &str, alias: &str) -> Self {
        self.join(JoinKind::Left, target, alias, None, true, None)
    }

    pub fn left_join_and_select_on(self, target: &str, alias: &str, condition: &str) -> Self {
        self.join(JoinKind::Left, target, alias, Some(condition), true, None)
    }

    /// Joins and selects `target`, hydrating the first joined entity onto
    /// `map_to` (`parentAlias.property`).
    pub fn inner_join_and_map_one(
        self,
        map_to: &str,
        target: &str,
        alias: &str,
        condition: Option<&str>,
    ) -> Self {
        self.join(JoinKind::Inner, target, alias, condition, true, Some((map_to, false)))
    }

    pub fn inner_join_and_map_many(
        self,
        map_to: &str,
        target: &str,
        alias: &str,
        condition: Option<&str>,
    ) -> Self {
        self.join(JoinKind::Inner, target, alias, condition, true, Some((map_to, true)))
    }

    pub fn left_join_and_map_one(
        self,
        map_to: &str,
        target: &str,
        alias: &str,
        condition: Option<&str>,
    ) -> Self {
        self.join(JoinKind::Left, target, alias, condition, true, Some((map_to, false)))
    }

    pub fn left_join_and_map_many(
        self,
        map_to: &str,
        target: &str,
        alias: &str,
        condition: Option<&str>,
    ) -> Self {
        self.join(JoinKind::Left, target, alias, condition, true, Some((map_to, true)))
    }

    /// Joins a sub-query under `alias`.
    pub fn left_join_sub_query(
        self,
        f: impl FnOnce(SelectQueryBuilder) -> SelectQueryBuilder,
        alias: &str,
        condition: &str,
    ) -> Self {
        self.join_sub_query(JoinKind::Left, f, alias, condition)
    }

    pub fn inner_join_sub_query(
        self,
        f: impl FnOnce(SelectQueryBuilder) -> SelectQueryBuilder,
        alias: &str,
        condition: &str,
    ) -> Self {
        self.join_sub_query(JoinKind::Inner, f, alias, condition)
    }

    fn join_sub_query(
        mut self,
        kind: JoinKind,
        f: impl FnOnce(SelectQueryBuilder) -> SelectQueryBuilder,
        alias: &str,
        condition: &str,
    ) -> Self {
        if let Some(select) = self.build_sub_query(f) {
            let res = join::add_join(
                &self.db,
                &mut self.map,
                kind,
                JoinTarget::Subquery(select),
                alias,
                Some(condition.to_string()),
                None,
            );
            if let Err(err) = res {
                self.map.fail(err);
            }
        }
        self
    }

    fn join(
        mut self,
        kind: JoinKind,
        target: &str,
        alias: &str,
        condition: Option<&str>,
        select: bool,
        map_to: Option<(&str, bool)>,
    ) -> Self {
        let res = join::add_join(
            &self.db,
            &mut self.map,
            kind,
            JoinTarget::Name(target.to_string()),
            alias,
            condition.map(str::to_string),
            map_to,
        );

        match res {
            Ok(()) if select => self.add_select(alias),
            Ok(()) => self,
            Err(err) => {
                self.map.fail(err);
                self
            }
        }
    }

    // ===== Relation side-loads =====

    /// Loads the ids of `relation` (`alias.relation`) onto `map_to`
    /// (`alias.property`) without joining the related entities.
    pub fn load_relation_id_and_map(mut self, map_to: &str, relation: &str) -> Self {
        match self.relation_attribute(map_to, relation) {
            Ok((parent_alias, relation, map_to)) => {
                self.map.relation_ids.push(RelationIdAttribute {
                    parent_alias,
                    relation,
                    map_to,
                    alias: None,
                    disable_mixed_map: false,
                });
            }
            Err(err) => self.map.fail(err),
        }
        self
    }

    /// Loads the number of related entities of `relation` onto `map_to`.
    pub fn load_relation_count_and_map(mut self, map_to: &str, relation: &str) -> Self {
        match self.relation_attribute(map_to, relation) {
            Ok((parent_alias, relation, map_to)) => {
                self.map.relation_counts.push(RelationCountAttribute {
                    parent_alias,
                    relation,
                    map_to,
                    alias: None,
                });
            }
            Err(err) => self.map.fail(err),
        }
        self
    }

    /// Loads the ids of every relation of the main entity onto the
    /// relation's own property.
    pub fn load_all_relation_ids(mut self) -> Self {
        let registry = self.db.registry().clone();
        let main = match self.map.main_alias() {
            Ok(alias) => alias.name.clone(),
            Err(err) => {
                self.map.fail(err);
                return self;
            }
        };

        let metadata = match self.map.main_metadata(&registry) {
            Ok(metadata) => metadata,
            Err(err) => {
                self.map.fail(err);
                return self;
            }
        };

        for relation in &metadata.relations {
            self.map.relation_ids.push(RelationIdAttribute {
                parent_alias: main.clone(),
                relation: relation.id,
                map_to: format!("{main}.{}", relation.property_path),
                alias: None,
                disable_mixed_map: false,
            });
        }
        self
    }

    fn relation_attribute(
        &self,
        map_to: &str,
        relation: &str,
    ) -> Result<(String, keel_core::schema::RelationId, String)> {
        let (parent, path) = relation
            .split_once('.')
            .ok_or_else(|| Error::invalid_parameter(relation, "must be `alias.relation`"))?;

        let registry = self.db.registry();
        let metadata = self
            .map
            .find_alias(parent)?
            .metadata(registry)
            .ok_or_else(|| Error::relation_not_found(parent, path))?;
        let relation = metadata
            .find_relation_with_property_path(path)
            .ok_or_else(|| Error::relation_not_found(&metadata.name, path))?;

        if !map_to.contains('.') {
            return Err(Error::invalid_parameter(map_to, "must be `alias.property`"));
        }

        Ok((parent.to_string(), relation.id, map_to.to_string()))
    }

    // ===== Conditions =====

    pub fn having(mut self, condition: impl Into<Condition>) -> Self {
        self.map.havings.clear();
        push_condition(&mut self, WhereKind::Simple, condition.into(), true);
        self
    }

    pub fn and_having(mut self, condition: impl Into<Condition>) -> Self {
        push_condition(&mut self, WhereKind::And, condition.into(), true);
        self
    }

    pub fn or_having(mut self, condition: impl Into<Condition>) -> Self {
        push_condition(&mut self, WhereKind::Or, condition.into(), true);
        self
    }

    /// Includes soft-deleted rows.
    pub fn with_deleted(mut self) -> Self {
        self.map.with_deleted = true;
        self
    }

    // ===== Ordering, grouping, pagination =====

    /// Replaces the ordering. `sort` is `alias.property`, a select alias,
    /// or SQL.
    pub fn order_by(mut self, sort: &str, direction: OrderDirection) -> Self {
        self.map.order_bys.clear();
        self.add_order_by_nulls(sort, direction, None)
    }

    pub fn order_by_nulls(mut self, sort: &str, direction: OrderDirection, nulls: Nulls) -> Self {
        self.map.order_bys.clear();
        self.add_order_by_nulls(sort, direction, Some(nulls))
    }

    pub fn add_order_by(self, sort: &str, direction: OrderDirection) -> Self {
        self.add_order_by_nulls(sort, direction, None)
    }

    fn add_order_by_nulls(
        mut self,
        sort: &str,
        direction: OrderDirection,
        nulls: Option<Nulls>,
    ) -> Self {
        self.map
            .order_bys
            .insert(sort.to_string(), OrderEntry { direction, nulls });
        self
    }

    /// Drops any ordering, including the entity's default one.
    pub fn clear_order_by(mut self) -> Self {
        self.map.order_bys.clear();
        self.map.disable_global_order = true;
        self
    }

    pub fn group_by(mut self, group: &str) -> Self {
        self.map.group_bys = vec![group.to_string()];
        self
    }

    pub fn add_group_by(mut self, group: &str) -> Self {
        self.map.group_bys.push(group.to_string());
        self
    }

    /// Row limit applied to the SQL as written. With joins, use `take` to
    /// limit entities instead.
    pub fn limit(mut self, limit: u64) -> Self {
        self.map.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.map.offset = Some(offset);
        self
    }

    /// Number of entities to load. Joined rows of one entity are never
    /// split.
    pub fn take(mut self, take: u64) -> Self {
        self.map.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.map.skip = Some(skip);
        self
    }

    // ===== Locks, cache, hints =====

    pub fn set_lock(mut self, mode: LockMode) -> Self {
        self.map.lock = Some(mode);
        self
    }

    /// Restricts a pessimistic lock to the given aliases (`FOR UPDATE OF`).
    pub fn set_lock_tables<S: AsRef<str>>(mut self, aliases: impl IntoIterator<Item = S>) -> Self {
        let mut tables = vec![];
        for alias in aliases {
            let alias = alias.as_ref();
            match self.map.find_alias(alias) {
                Ok(_) => tables.push(self.db.escape(alias)),
                Err(err) => self.map.fail(err),
            }
        }
        self.map.lock_tables = Some(tables);
        self
    }

    pub fn set_on_locked(mut self, on_locked: OnLocked) -> Self {
        self.map.on_locked = Some(on_locked);
        self
    }

    /// Turns the query-result cache on or off for this query.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.map.cache = Some(enabled);
        self
    }

    /// Caches the result under `id` (when given) for `duration`.
    pub fn cache_for(mut self, id: Option<&str>, duration: Duration) -> Self {
        self.map.cache = Some(true);
        self.map.cache_id = id.map(str::to_string);
        self.map.cache_duration = Some(duration);
        self
    }

    /// Leading `/* comment */`.
    pub fn comment(mut self, comment: &str) -> Self {
        self.map.comment = Some(comment.to_string());
        self
    }

    /// MySQL `MAX_EXECUTION_TIME` optimizer hint, in milliseconds.
    pub fn max_execution_time(mut self, ms: u64) -> Self {
        self.map.max_execution_time = Some(ms);
        self
    }
}

impl WhereExpressionBuilder for SelectQueryBuilder {
    fn db(&self) -> &Db {
        &self.db
    }

    fn expression_map(&self) -> &ExpressionMap {
        &self.map
    }

    fn expression_map_mut(&mut self) -> &mut ExpressionMap {
        &mut self.map
    }
}

impl QueryBuilder for SelectQueryBuilder {
    fn query_runner_slot(&mut self) -> &mut Option<Arc<dyn QueryRunner>> {
        &mut self.runner
    }

    fn build_statement(&self) -> Result<(Statement, IndexMap<String, Value>)> {
        let (select, params) = self.build_select()?;
        Ok((select.into(), params))
    }
}

impl std::fmt::Debug for SelectQueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectQueryBuilder")
            .field("map", &self.map)
            .field("bound_runner", &self.runner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests;
