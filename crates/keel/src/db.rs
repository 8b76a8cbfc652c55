mod builder;
pub use builder::Builder;

mod cache;
pub use cache::{CacheEntry, CacheOptions, MemoryQueryResultCache, QueryResultCache};
pub(crate) use cache::now_millis;

use crate::query::{
    DeleteQueryBuilder, InsertQueryBuilder, RelationQueryBuilder, SelectQueryBuilder,
    SoftDeleteQueryBuilder, UpdateQueryBuilder,
};
use crate::Result;

use keel_core::{
    driver::{Capability, Driver, QueryRunner},
    schema::NamingStrategy,
    Registry,
};
use keel_sql::Serializer;

use std::{future::Future, sync::Arc};
use tracing::{info, warn};

/// Shared state between all `Db` clones.
pub(crate) struct Shared {
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) capability: &'static Capability,
    pub(crate) naming: Arc<dyn NamingStrategy>,

    /// Overrides the capability's identifier length limit.
    pub(crate) max_alias_length: Option<usize>,

    pub(crate) cache: Option<Arc<dyn QueryResultCache>>,
    pub(crate) cache_options: CacheOptions,
}

/// A database handle: compiled metadata plus the driver queries run on.
///
/// Cloning is cheap; all clones share the same registry and driver.
#[derive(Clone)]
pub struct Db {
    pub(crate) shared: Arc<Shared>,
}

impl Db {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.shared.registry
    }

    pub fn capability(&self) -> &'static Capability {
        self.shared.capability
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.shared.driver
    }

    pub(crate) fn serializer(&self) -> Serializer<'static> {
        Serializer::new(self.shared.capability)
    }

    pub(crate) fn naming(&self) -> &dyn NamingStrategy {
        &*self.shared.naming
    }

    /// Quotes an identifier for the connected database.
    pub fn escape(&self, ident: &str) -> String {
        self.serializer().escape(ident)
    }

    /// Longest identifier the database accepts, if it has a limit.
    pub fn max_alias_length(&self) -> Option<usize> {
        self.shared
            .max_alias_length
            .or(self.shared.capability.max_alias_length)
    }

    pub fn query_result_cache(&self) -> Option<&Arc<dyn QueryResultCache>> {
        self.shared.cache.as_ref()
    }

    pub fn cache_options(&self) -> &CacheOptions {
        &self.shared.cache_options
    }

    /// An empty select builder with no main alias yet; call `from` on it.
    pub fn create_query_builder(&self) -> SelectQueryBuilder {
        SelectQueryBuilder::new(self.clone())
    }

    /// Selects entity `target` under `alias`.
    pub fn select(&self, target: &str, alias: &str) -> SelectQueryBuilder {
        self.create_query_builder().select(alias).from(target, alias)
    }

    pub fn insert(&self) -> InsertQueryBuilder {
        InsertQueryBuilder::new(self.clone())
    }

    pub fn update(&self, target: &str) -> UpdateQueryBuilder {
        UpdateQueryBuilder::new(self.clone(), target)
    }

    pub fn delete(&self) -> DeleteQueryBuilder {
        DeleteQueryBuilder::new(self.clone())
    }

    pub fn soft_delete(&self) -> SoftDeleteQueryBuilder {
        SoftDeleteQueryBuilder::soft_delete(self.clone())
    }

    pub fn restore(&self) -> SoftDeleteQueryBuilder {
        SoftDeleteQueryBuilder::restore(self.clone())
    }

    /// Mutates or loads the relation `property_path` of entity `target`.
    pub fn relation(&self, target: &str, property_path: &str) -> RelationQueryBuilder {
        RelationQueryBuilder::new(self.clone(), target, property_path)
    }

    /// Obtains a runner from the driver. The caller owns it and must release
    /// it.
    pub async fn create_query_runner(&self) -> Result<Arc<dyn QueryRunner>> {
        self.shared.driver.create_query_runner().await
    }

    /// Runs `f` inside a transaction on a fresh runner.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back
    /// otherwise. A failed rollback is logged and the original error is
    /// returned. The runner is released in every case.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn QueryRunner>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let runner = self.create_query_runner().await?;

        let res = async {
            runner.start_transaction().await?;
            info!(target: "keel::query", "transaction started");

            let value = f(runner.clone()).await?;
            runner.commit_transaction().await?;
            info!(target: "keel::query", "transaction committed");
            Ok(value)
        }
        .await;

        if res.is_err() && runner.is_transaction_active() {
            match runner.rollback_transaction().await {
                Ok(()) => info!(target: "keel::query", "transaction rolled back"),
                Err(rollback) => warn!(
                    target: "keel::query",
                    error = %rollback,
                    "rollback failed; returning the original error"
                ),
            }
        }

        if !runner.is_released() {
            runner.release().await?;
        }

        res
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("driver", &self.shared.driver)
            .field("kind", &self.shared.capability.kind)
            .field("cache", &self.shared.cache)
            .finish()
    }
}
