use super::{EntityRef, ExpressionMap, QueryType};
use crate::{hydrate::Entity, loader, relation, Db, Result};

use keel_core::{driver::QueryRunner, schema::Relation, Error};

use std::sync::Arc;

/// Changes or loads one relation of given entities without loading the
/// entities themselves.
///
/// ```ignore
/// db.relation("Post", "categories")
///     .of(1)
///     .add([3, 4])
///     .await?;
/// ```
#[derive(Clone)]
pub struct RelationQueryBuilder {
    db: Db,
    map: ExpressionMap,
    runner: Option<Arc<dyn QueryRunner>>,
    target: String,
    property_path: String,
    of: Vec<EntityRef>,
}

impl RelationQueryBuilder {
    pub(crate) fn new(db: Db, target: &str, property_path: &str) -> RelationQueryBuilder {
        RelationQueryBuilder {
            db,
            map: ExpressionMap::new(QueryType::Relation),
            runner: None,
            target: target.to_string(),
            property_path: property_path.to_string(),
            of: vec![],
        }
    }

    /// The entity whose relation is changed or loaded.
    pub fn of(mut self, entity: impl Into<EntityRef>) -> Self {
        self.of = vec![entity.into()];
        self
    }

    /// Several owners at once.
    pub fn of_many<T: Into<EntityRef>>(mut self, entities: impl IntoIterator<Item = T>) -> Self {
        self.of = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_query_runner(mut self, runner: Arc<dyn QueryRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn use_transaction(mut self, enabled: bool) -> Self {
        self.map.use_transaction = enabled;
        self
    }

    pub fn expression_map(&self) -> &ExpressionMap {
        &self.map
    }

    /// Sets a many-to-one or one-to-one relation; `None` clears it.
    pub async fn set<T: Into<EntityRef>>(&self, value: Option<T>) -> Result<()> {
        let relation = self.relation()?;
        let value = value.map(Into::into);
        relation::set(&self.link(), relation, &self.of, value.as_ref()).await
    }

    /// Links `values` to a one-to-many or many-to-many relation.
    pub async fn add<T: Into<EntityRef>>(&self, values: impl IntoIterator<Item = T>) -> Result<()> {
        let relation = self.relation()?;
        let values: Vec<EntityRef> = values.into_iter().map(Into::into).collect();
        relation::add(&self.link(), relation, &self.of, &values).await
    }

    /// Unlinks `values` from a one-to-many or many-to-many relation.
    pub async fn remove<T: Into<EntityRef>>(&self, values: impl IntoIterator<Item = T>) -> Result<()> {
        let relation = self.relation()?;
        let values: Vec<EntityRef> = values.into_iter().map(Into::into).collect();
        relation::remove(&self.link(), relation, &self.of, &values).await
    }

    /// Removes `removed`, then adds `added`.
    pub async fn add_and_remove<A, R>(
        &self,
        added: impl IntoIterator<Item = A>,
        removed: impl IntoIterator<Item = R>,
    ) -> Result<()>
    where
        A: Into<EntityRef>,
        R: Into<EntityRef>,
    {
        let added: Vec<EntityRef> = added.into_iter().map(Into::into).collect();
        self.remove(removed).await?;
        self.add(added).await
    }

    /// The first related entity, if any.
    pub async fn load_one(&self) -> Result<Option<Entity>> {
        Ok(self.load_many().await?.into_iter().next())
    }

    pub async fn load_many(&self) -> Result<Vec<Entity>> {
        let relation = self.relation()?;
        loader::load_related(&self.db, self.runner.as_ref(), relation, &self.of).await
    }

    fn relation(&self) -> Result<&Relation> {
        self.map.check()?;

        let registry = self.db.registry();
        let metadata = registry
            .get(&self.target)
            .ok_or_else(|| Error::relation_not_found(&self.target, &self.property_path))?;
        let relation = metadata
            .find_relation_with_property_path(&self.property_path)
            .ok_or_else(|| Error::relation_not_found(&metadata.name, &self.property_path))?;

        if self.of.is_empty() {
            return Err(Error::invalid_parameter(
                "of",
                "name the entities whose relation is used",
            ));
        }
        Ok(relation)
    }

    fn link(&self) -> relation::Link<'_> {
        relation::Link {
            db: &self.db,
            runner: self.runner.as_ref(),
            use_transaction: self.map.use_transaction,
        }
    }
}

impl std::fmt::Debug for RelationQueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationQueryBuilder")
            .field("target", &self.target)
            .field("property_path", &self.property_path)
            .field("of", &self.of)
            .field("bound_runner", &self.runner.is_some())
            .finish()
    }
}
