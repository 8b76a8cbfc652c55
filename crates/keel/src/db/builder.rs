use super::{CacheOptions, Db, MemoryQueryResultCache, QueryResultCache, Shared};
use crate::Result;

use keel_core::{
    driver::Driver,
    schema::{self, DefaultNamingStrategy, EntityDef, NamingStrategy},
    Registry,
};

use std::sync::Arc;

#[derive(Default)]
pub struct Builder {
    /// Schema builder
    core: schema::Builder,

    /// Naming strategy, kept to derive implicit join aliases at query time.
    naming: Option<Arc<dyn NamingStrategy>>,

    /// A registry compiled elsewhere; entity definitions are ignored when set.
    registry: Option<Arc<Registry>>,

    cache_options: Option<CacheOptions>,
    cache: Option<Arc<dyn QueryResultCache>>,
    max_alias_length: Option<usize>,
}

impl Builder {
    pub fn register(&mut self, def: EntityDef) -> &mut Self {
        self.core.entity(def);
        self
    }

    /// Use an already compiled registry.
    pub fn registry(&mut self, registry: impl Into<Arc<Registry>>) -> &mut Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn naming_strategy(&mut self, naming: Arc<dyn NamingStrategy>) -> &mut Self {
        self.core.naming_strategy(naming.clone());
        self.naming = Some(naming);
        self
    }

    /// Set the table name prefix for all tables
    pub fn table_name_prefix(&mut self, prefix: &str) -> &mut Self {
        self.core.table_name_prefix(prefix);
        self
    }

    /// Enables the query-result cache. Without an explicit backend, results
    /// are cached in memory.
    pub fn cache(&mut self, options: CacheOptions) -> &mut Self {
        self.cache_options = Some(options);
        self
    }

    pub fn query_result_cache(&mut self, cache: Arc<dyn QueryResultCache>) -> &mut Self {
        self.cache = Some(cache);
        self
    }

    /// Overrides the identifier length limit of the driver's capability.
    pub fn max_alias_length(&mut self, len: usize) -> &mut Self {
        self.max_alias_length = Some(len);
        self
    }

    pub fn build(&mut self, driver: impl Driver) -> Result<Db> {
        let capability = driver.capability();

        let registry = match &self.registry {
            Some(registry) => registry.clone(),
            None => Arc::new(self.core.build(capability)?),
        };

        let cache = match (&self.cache, &self.cache_options) {
            (Some(cache), _) => Some(cache.clone()),
            (None, Some(_)) => {
                Some(Arc::new(MemoryQueryResultCache::new()) as Arc<dyn QueryResultCache>)
            }
            (None, None) => None,
        };

        let naming = self
            .naming
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultNamingStrategy));

        Ok(Db {
            shared: Arc::new(Shared {
                driver: Arc::new(driver),
                registry,
                capability,
                naming,
                max_alias_length: self.max_alias_length,
                cache,
                cache_options: self.cache_options.unwrap_or_default(),
            }),
        })
    }
}
