use super::{build::Pagination, LockMode, SelectQueryBuilder};
use crate::{
    db::{now_millis, CacheEntry, QueryResultCache},
    hydrate::{self, Entity},
    loader,
    query::{QueryBuilder, Session},
    Result,
};

use keel_core::{
    driver::RowStream,
    stmt::{Row, Value},
    Error,
};
use keel_sql::{stmt::Select, Statement};

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, warn};

impl SelectQueryBuilder {
    /// Runs the query and returns the rows as the database produced them.
    pub async fn get_raw_many(&self) -> Result<Vec<Row>> {
        let session = self.open_session().await?;
        let res = self.raw_many_in(&session).await;
        session.finish(res).await
    }

    pub async fn get_raw_one(&self) -> Result<Option<Row>> {
        Ok(self.get_raw_many().await?.into_iter().next())
    }

    /// Same as [`get_raw_many`](Self::get_raw_many).
    pub async fn execute(&self) -> Result<Vec<Row>> {
        self.get_raw_many().await
    }

    /// Runs the query and returns both the raw rows and the hydrated main
    /// entities.
    pub async fn get_raw_and_entities(&self) -> Result<(Vec<Row>, Vec<Entity>)> {
        let session = self.open_session().await?;
        let res = self.raw_and_entities_in(&session).await;
        session.finish(res).await
    }

    pub async fn get_many(&self) -> Result<Vec<Entity>> {
        self.reject_optimistic_lock()?;
        Ok(self.get_raw_and_entities().await?.1)
    }

    /// The first entity. With an optimistic lock, its version is checked
    /// against the expected one.
    pub async fn get_one(&self) -> Result<Option<Entity>> {
        let (_, entities) = self.get_raw_and_entities().await?;
        let entity = entities.into_iter().next();

        if let (Some(entity), Some(LockMode::Optimistic(expected))) = (&entity, &self.map.lock) {
            self.check_version(entity, expected)?;
        }

        Ok(entity)
    }

    pub async fn get_one_or_fail(&self) -> Result<Entity> {
        match self.get_one().await? {
            Some(entity) => Ok(entity),
            None => {
                let registry = self.db.registry();
                let name = match self.map.main_metadata(registry) {
                    Ok(metadata) => metadata.name.clone(),
                    Err(_) => self.map.main_alias()?.name.clone(),
                };
                Err(Error::entity_not_found(name, self.get_query()?))
            }
        }
    }

    /// Entities in the requested window plus the number of entities
    /// matching the query, ignoring pagination.
    pub async fn get_many_and_count(&self) -> Result<(Vec<Entity>, u64)> {
        self.reject_optimistic_lock()?;

        let session = self.open_session().await?;
        let res = async {
            let (_, entities) = self.raw_and_entities_in(&session).await?;
            let count = self.count_in(&session).await?;
            Ok::<_, Error>((entities, count))
        }
        .await;
        session.finish(res).await
    }

    /// Number of main entities matching the query. Pagination and ordering
    /// do not affect it.
    pub async fn get_count(&self) -> Result<u64> {
        self.reject_optimistic_lock()?;

        let session = self.open_session().await?;
        let res = self.count_in(&session).await;
        session.finish(res).await
    }

    /// Whether the query matches at least one row.
    pub async fn get_exists(&self) -> Result<bool> {
        self.reject_optimistic_lock()?;

        let session = self.open_session().await?;
        let res = async {
            self.check_lock(&session)?;
            let (select, params) = self.build_exists()?;
            let result = session.query(&Statement::from(select), &params).await?;
            Ok::<_, Error>(!result.records.is_empty())
        }
        .await;
        session.finish(res).await
    }

    /// Streams raw rows. Reading the last row commits a transaction started
    /// for the stream and releases the runner; dropping the stream early
    /// rolls the transaction back and releases the runner instead.
    pub async fn stream(&self) -> Result<RowStream> {
        let (select, params) = self.build_select()?;
        let session = self.open_session().await?;

        if let Err(err) = self.check_lock(&session) {
            return session.finish(Err(err)).await;
        }

        session.stream(&Statement::from(select), &params).await
    }

    async fn open_session(&self) -> Result<Session> {
        self.map.check()?;
        Session::open(&self.db, self.runner.as_ref(), self.map.use_transaction).await
    }

    fn reject_optimistic_lock(&self) -> Result<()> {
        match &self.map.lock {
            Some(lock) if lock.is_optimistic() => Err(Error::optimistic_lock_can_not_be_used()),
            _ => Ok(()),
        }
    }

    fn check_lock(&self, session: &Session) -> Result<()> {
        match &self.map.lock {
            Some(lock) if lock.is_pessimistic() && !session.is_transaction_active() => {
                Err(Error::pessimistic_lock_transaction_required())
            }
            _ => Ok(()),
        }
    }

    async fn raw_many_in(&self, session: &Session) -> Result<Vec<Row>> {
        self.check_lock(session)?;
        let (select, params) = self.build_select()?;
        self.load_raw(session, select, params, "").await
    }

    async fn raw_and_entities_in(&self, session: &Session) -> Result<(Vec<Row>, Vec<Entity>)> {
        self.check_lock(session)?;

        if let Some(LockMode::Optimistic(_)) = &self.map.lock {
            let metadata = self.map.main_metadata(self.db.registry())?;
            if metadata.version_column().is_none() && metadata.update_date_column().is_none() {
                return Err(Error::no_version_or_update_date_column(&metadata.name));
            }
        }

        let rows = match self.pagination() {
            Pagination::Entity { skip, take } => {
                let (select, params) = self.build_distinct_ids(skip, take)?;
                let ids = self.load_raw(session, select, params, "-pagination").await?;

                if ids.is_empty() {
                    return Ok((vec![], vec![]));
                }

                let bounded = self.bounded_by(&ids)?;
                let (select, params) = bounded.build_select()?;
                bounded.load_raw(session, select, params, "").await?
            }
            Pagination::Raw { .. } => {
                let (select, params) = self.build_select()?;
                self.load_raw(session, select, params, "").await?
            }
        };

        let runner = session.runner();
        let relation_ids = loader::load_relation_ids(&self.db, runner, &self.map, &rows).await?;
        let relation_counts =
            loader::load_relation_counts(&self.db, runner, &self.map, &rows).await?;

        let entities =
            hydrate::transform(&self.db, &self.map, &rows, &relation_ids, &relation_counts)?;
        Ok((rows, entities))
    }

    async fn count_in(&self, session: &Session) -> Result<u64> {
        self.check_lock(session)?;

        let (select, params) = self.build_count()?;
        let rows = self.load_raw(session, select, params, "-count").await?;

        let count = rows
            .first()
            .and_then(|row| row.get("cnt"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn check_version(&self, entity: &Entity, expected: &Value) -> Result<()> {
        let metadata = self.map.main_metadata(self.db.registry())?;

        let column = if expected.is_numeric() {
            metadata.version_column().or(metadata.update_date_column())
        } else {
            metadata.update_date_column().or(metadata.version_column())
        };
        let column =
            column.ok_or_else(|| Error::no_version_or_update_date_column(&metadata.name))?;

        let actual = entity
            .value(&column.property_path)
            .cloned()
            .unwrap_or(Value::Null);

        if actual.loose_eq(expected) {
            Ok(())
        } else {
            Err(Error::optimistic_lock_version_mismatch(
                &metadata.name,
                expected.clone(),
                actual,
            ))
        }
    }

    /// Runs one select, going through the query-result cache when it is
    /// enabled for this query. `suffix` tells apart the cache entries of
    /// the side queries sharing the caller's cache id.
    async fn load_raw(
        &self,
        session: &Session,
        select: Select,
        params: IndexMap<String, Value>,
        suffix: &str,
    ) -> Result<Vec<Row>> {
        let (sql, bound) = session.serialize(&Statement::from(select), &params)?;

        let Some(cache) = self.result_cache() else {
            return Ok(session.query_sql(&sql, &bound).await?.records);
        };

        let query = format!("{sql} -- PARAMETERS: {}", serde_json::to_string(&bound)?);
        let identifier = self.map.cache_id.as_ref().map(|id| format!("{id}{suffix}"));

        match cache.get_from_cache(identifier.as_deref(), &query).await {
            Ok(Some(entry)) if !cache.is_expired(&entry) => {
                match serde_json::from_str::<Vec<Row>>(&entry.result) {
                    Ok(rows) => {
                        debug!(target: "keel::query", sql = sql.as_str(), "served from cache");
                        return Ok(rows);
                    }
                    Err(err) => self.cache_error(err.into())?,
                }
            }
            Ok(_) => {}
            Err(err) => self.cache_error(err)?,
        }

        let rows = session.query_sql(&sql, &bound).await?.records;

        let duration = self
            .map
            .cache_duration
            .unwrap_or(self.db.cache_options().duration);
        let entry = CacheEntry {
            identifier,
            query,
            time: now_millis(),
            duration: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            result: serde_json::to_string(&rows)?,
        };
        if let Err(err) = cache.store_in_cache(entry).await {
            self.cache_error(err)?;
        }

        Ok(rows)
    }

    fn result_cache(&self) -> Option<&Arc<dyn QueryResultCache>> {
        let cache = self.db.query_result_cache()?;
        let enabled = self
            .map
            .cache
            .unwrap_or(self.db.cache_options().always_enabled);
        enabled.then_some(cache)
    }

    fn cache_error(&self, err: Error) -> Result<()> {
        if self.db.cache_options().ignore_errors {
            warn!(target: "keel::query", error = %err, "query result cache failed; running the query");
            Ok(())
        } else {
            Err(err)
        }
    }
}
