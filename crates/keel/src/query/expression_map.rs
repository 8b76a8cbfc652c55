use super::{
    attribute::{JoinAttribute, RelationCountAttribute, RelationIdAttribute},
    condition::WhereClause,
    select::LockMode,
    Alias, AliasKind, AliasTarget,
};
use crate::Result;

use keel_core::{
    schema::{Column, EntityMetadata, OrderDirection},
    stmt::Value,
    Error, Registry,
};
use keel_sql::stmt::{Expr, Nulls, OnLocked, Returning};

use indexmap::IndexMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    SoftDelete,
    Restore,
    Relation,
}

/// One entry of the select list as the caller wrote it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectEntry {
    /// An alias name (select the whole entity), `alias.property`, or SQL.
    pub(crate) selection: String,

    pub(crate) alias: Option<String>,

    /// Already lowered expression (a sub-query) standing in for
    /// `selection`.
    pub(crate) expr: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OrderEntry {
    pub(crate) direction: OrderDirection,
    pub(crate) nulls: Option<Nulls>,
}

/// State accumulated by a query builder.
///
/// Cloning yields an independent copy: aliases, joins and conditions are
/// deep-copied, parameter values are plain data.
#[derive(Debug, Clone)]
pub struct ExpressionMap {
    pub(crate) query_type: QueryType,
    pub(crate) main_alias: Option<String>,
    pub(crate) aliases: Vec<Alias>,

    /// Prefix columns with their alias. Off for UPDATE and DELETE, whose
    /// target table is not aliased.
    pub(crate) alias_prefixing: bool,

    pub(crate) selects: Vec<SelectEntry>,
    pub(crate) distinct: bool,
    pub(crate) distinct_on: Vec<String>,

    pub(crate) joins: Vec<JoinAttribute>,
    pub(crate) relation_ids: Vec<RelationIdAttribute>,
    pub(crate) relation_counts: Vec<RelationCountAttribute>,

    pub(crate) wheres: Vec<WhereClause>,
    pub(crate) havings: Vec<WhereClause>,
    pub(crate) order_bys: IndexMap<String, OrderEntry>,
    pub(crate) group_bys: Vec<String>,

    /// Raw row pagination.
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,

    /// Entity pagination.
    pub(crate) skip: Option<u64>,
    pub(crate) take: Option<u64>,

    pub(crate) lock: Option<LockMode>,
    pub(crate) lock_tables: Option<Vec<String>>,
    pub(crate) on_locked: Option<OnLocked>,

    pub(crate) parameters: IndexMap<String, Value>,

    /// Counter for generated `orm_param_N` names.
    pub(crate) param_index: usize,

    pub(crate) cache: Option<bool>,
    pub(crate) cache_id: Option<String>,
    pub(crate) cache_duration: Option<Duration>,

    pub(crate) use_transaction: bool,
    pub(crate) with_deleted: bool,
    pub(crate) comment: Option<String>,
    pub(crate) max_execution_time: Option<u64>,

    /// Read generated values back after INSERT.
    pub(crate) update_entity: bool,

    pub(crate) returning: Option<Returning>,

    /// AND'ed onto the WHERE clause; used by the second pagination query.
    pub(crate) extra_condition: Option<Expr>,

    /// Skip the entity's default ordering.
    pub(crate) disable_global_order: bool,

    /// First error raised while building; reported when the query is built
    /// or executed.
    pub(crate) error: Option<Error>,
}

impl ExpressionMap {
    pub(crate) fn new(query_type: QueryType) -> ExpressionMap {
        ExpressionMap {
            query_type,
            main_alias: None,
            aliases: vec![],
            alias_prefixing: !matches!(
                query_type,
                QueryType::Update
                    | QueryType::Delete
                    | QueryType::SoftDelete
                    | QueryType::Restore
            ),
            selects: vec![],
            distinct: false,
            distinct_on: vec![],
            joins: vec![],
            relation_ids: vec![],
            relation_counts: vec![],
            wheres: vec![],
            havings: vec![],
            order_bys: IndexMap::new(),
            group_bys: vec![],
            limit: None,
            offset: None,
            skip: None,
            take: None,
            lock: None,
            lock_tables: None,
            on_locked: None,
            parameters: IndexMap::new(),
            param_index: 0,
            cache: None,
            cache_id: None,
            cache_duration: None,
            use_transaction: false,
            with_deleted: false,
            comment: None,
            max_execution_time: None,
            update_entity: true,
            returning: None,
            extra_condition: None,
            disable_global_order: false,
            error: None,
        }
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    pub fn main_alias_name(&self) -> Option<&str> {
        self.main_alias.as_deref()
    }

    pub fn parameters(&self) -> &IndexMap<String, Value> {
        &self.parameters
    }

    /// Records the first error; later ones are dropped.
    pub(crate) fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Appends a new alias. An existing alias with the same name is replaced.
    pub(crate) fn create_alias(
        &mut self,
        kind: AliasKind,
        name: impl Into<String>,
        target: AliasTarget,
    ) -> &Alias {
        let name = name.into();
        self.aliases.retain(|alias| alias.name != name);
        self.aliases.push(Alias { kind, name, target });
        &self.aliases[self.aliases.len() - 1]
    }

    pub(crate) fn has_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|alias| alias.name == name)
    }

    pub fn find_alias(&self, name: &str) -> Result<&Alias> {
        self.aliases
            .iter()
            .find(|alias| alias.name == name)
            .ok_or_else(|| Error::alias_not_found(name))
    }

    pub fn main_alias(&self) -> Result<&Alias> {
        match &self.main_alias {
            Some(name) => self.find_alias(name),
            None => Err(keel_core::err!("main alias is not set; call `from` first")),
        }
    }

    /// Metadata of the main alias; fails for unmapped tables.
    pub(crate) fn main_metadata<'a>(&self, registry: &'a Registry) -> Result<&'a EntityMetadata> {
        let alias = self.main_alias()?;
        alias.metadata(registry).ok_or_else(|| {
            keel_core::err!(
                "alias {} is not bound to an entity",
                alias.name
            )
        })
    }

    /// Resolves `alias.property.path` to a column.
    pub fn find_column_by_alias_expression<'a>(
        &self,
        registry: &'a Registry,
        expression: &str,
    ) -> Result<&'a Column> {
        let (alias_name, path) = expression
            .split_once('.')
            .ok_or_else(|| Error::entity_column_not_found(expression))?;

        let alias = self.find_alias(alias_name)?;
        let metadata = alias
            .metadata(registry)
            .ok_or_else(|| Error::entity_column_not_found(expression))?;

        metadata
            .find_column_with_property_path(path)
            .ok_or_else(|| Error::entity_column_not_found(expression))
    }

    /// Binds `value` to a fresh `orm_param_N` name and returns the name.
    /// Names already bound (e.g. merged from a sub-query) are skipped.
    pub(crate) fn create_parameter(&mut self, value: Value) -> String {
        let name = loop {
            let name = format!("orm_param_{}", self.param_index);
            self.param_index += 1;
            if !self.parameters.contains_key(&name) {
                break name;
            }
        };
        self.parameters.insert(name.clone(), value);
        name
    }

    /// Takes over the parameters of a sub-query built from a copy of this
    /// map.
    pub(crate) fn merge_parameters(&mut self, sub: &ExpressionMap) {
        for (name, value) in &sub.parameters {
            self.parameters.insert(name.clone(), value.clone());
        }
        self.param_index = self.param_index.max(sub.param_index);
    }

    pub(crate) fn set_parameter(&mut self, name: &str, value: Value) -> Result<()> {
        validate_parameter_name(name)?;
        self.parameters.insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }

    /// Whether `alias` is selected as a whole entity.
    pub(crate) fn selects_alias(&self, alias: &str) -> bool {
        self.selects.iter().any(|s| s.selection == alias)
    }

    /// Whether `alias` has any column selected, in whole or in part.
    pub(crate) fn selects_any_of(&self, alias: &str) -> bool {
        let prefix = format!("{alias}.");
        self.selects
            .iter()
            .any(|s| s.selection == alias || s.selection.starts_with(&prefix))
    }

    /// Order-by entries in effect: explicit ones, or the main entity's
    /// default ordering when none are given.
    pub(crate) fn all_order_bys(&self, registry: &Registry) -> IndexMap<String, OrderEntry> {
        if !self.order_bys.is_empty() || self.disable_global_order {
            return self.order_bys.clone();
        }

        let Ok(alias) = self.main_alias() else {
            return IndexMap::new();
        };
        let Some(metadata) = alias.metadata(registry) else {
            return IndexMap::new();
        };

        metadata
            .order_by
            .iter()
            .map(|(path, direction)| {
                (
                    format!("{}.{path}", alias.name),
                    OrderEntry {
                        direction: *direction,
                        nulls: None,
                    },
                )
            })
            .collect()
    }
}

/// Parameter names are limited to letters, digits, `_` and `.`.
pub(crate) fn validate_parameter_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(Error::invalid_parameter(
            name,
            "parameter names may only contain letters, digits, `_` and `.`",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::schema::{Builder, ColumnDef, EntityDef};
    use keel_core::driver::Capability;

    fn registry() -> Registry {
        Builder::new()
            .entity(
                EntityDef::new("Post")
                    .column(ColumnDef::primary_generated("id"))
                    .column(ColumnDef::new("title", "varchar")),
            )
            .build(&Capability::POSTGRESQL)
            .unwrap()
    }

    fn map(registry: &Registry) -> ExpressionMap {
        let mut map = ExpressionMap::new(QueryType::Select);
        let id = registry.find("Post").unwrap().id;
        map.create_alias(AliasKind::From, "post", AliasTarget::Entity(id));
        map.main_alias = Some("post".to_string());
        map
    }

    #[test]
    fn resolves_alias_expressions() {
        let registry = registry();
        let map = map(&registry);

        let column = map
            .find_column_by_alias_expression(&registry, "post.title")
            .unwrap();
        assert_eq!(column.property_path, "title");

        let err = map
            .find_column_by_alias_expression(&registry, "author.name")
            .unwrap_err();
        assert!(err.is_alias_not_found());

        let err = map
            .find_column_by_alias_expression(&registry, "post.nope")
            .unwrap_err();
        assert!(err.is_entity_column_not_found());
    }

    #[test]
    fn generated_parameter_names() {
        let registry = registry();
        let mut map = map(&registry);
        assert_eq!(map.create_parameter(Value::from(1)), "orm_param_0");
        assert_eq!(map.create_parameter(Value::from(2)), "orm_param_1");
        assert_eq!(map.parameters.len(), 2);
    }

    #[test]
    fn generated_names_skip_bound_ones() {
        let registry = registry();
        let mut map = map(&registry);
        map.set_parameter("orm_param_0", Value::from("mine")).unwrap();

        assert_eq!(map.create_parameter(Value::from(1)), "orm_param_1");
        assert_eq!(map.parameters["orm_param_0"], Value::from("mine"));
    }

    #[test]
    fn parameter_names_are_validated() {
        let registry = registry();
        let mut map = map(&registry);
        assert!(map.set_parameter("user.id", Value::from(1)).is_ok());
        let err = map.set_parameter("bad name", Value::from(1)).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn clones_are_independent() {
        let registry = registry();
        let original = map(&registry);
        let mut copy = original.clone();
        copy.set_parameter("x", Value::from(1)).unwrap();
        copy.limit = Some(3);
        assert!(original.parameters.is_empty());
        assert_eq!(original.limit, None);
    }
}
