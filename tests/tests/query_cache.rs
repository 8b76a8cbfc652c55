use tests::prelude::*;

use keel::db::{CacheOptions, MemoryQueryResultCache, QueryResultCache};
use pretty_assertions::assert_eq;
use std::{sync::Arc, time::Duration};

fn cached_db(test: &mut DbTest, cache: Arc<MemoryQueryResultCache>) -> Db {
    let mut builder = entities!(fixtures::author(), fixtures::article(), fixtures::label());
    builder.cache(CacheOptions::default()).query_result_cache(cache);
    test.setup_db(builder)
}

async fn repeated_queries_are_served_from_the_cache(mut test: DbTest) {
    let cache = Arc::new(MemoryQueryResultCache::new());
    let db = cached_db(&mut test, cache.clone());
    let log = test.log();
    test.push_rows(vec![Row::new().with("label_id", 1).with("label_name", "news")]);

    let query = db.select("Label", "label").cache(true);
    let first = assert_ok!(query.get_many().await);
    let second = assert_ok!(query.get_many().await);

    assert_eq!(log.queries(), 1);
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);

    // Not opted in
    assert_ok!(db.select("Label", "label").get_many().await);
    assert_eq!(log.queries(), 2);
}

async fn side_queries_get_their_own_entries(mut test: DbTest) {
    let cache = Arc::new(MemoryQueryResultCache::new());
    let db = cached_db(&mut test, cache.clone());
    let log = test.log();
    test.push_rows(vec![Row::new().with("label_id", 1).with("label_name", "news")]);
    test.push_rows(vec![Row::new().with("cnt", 1)]);

    let query = db
        .select("Label", "label")
        .cache_for(Some("labels"), Duration::from_secs(60));
    let (labels, total) = assert_ok!(query.get_many_and_count().await);
    assert_eq!((labels.len(), total), (1, 1));
    assert_eq!(cache.len(), 2);

    let (labels, total) = assert_ok!(query.get_many_and_count().await);
    assert_eq!((labels.len(), total), (1, 1));
    assert_eq!(log.queries(), 2);

    // Dropping the main entry leaves the count cached
    test.push_rows(vec![]);
    assert_ok!(cache.remove(&["labels".to_string()]).await);
    let (labels, total) = assert_ok!(query.get_many_and_count().await);
    assert_eq!((labels.len(), total), (0, 1));
    assert_eq!(log.queries(), 3);
}

async fn parameters_are_part_of_the_key(mut test: DbTest) {
    let cache = Arc::new(MemoryQueryResultCache::new());
    let db = cached_db(&mut test, cache.clone());
    let log = test.log();

    for id in [1, 2, 1] {
        assert_ok!(
            db.select("Label", "label")
                .where_in_ids([id])
                .cache(true)
                .get_many()
                .await
        );
    }

    assert_eq!(log.queries(), 2);
    assert_eq!(cache.len(), 2);
}

tests!(
    repeated_queries_are_served_from_the_cache,
    side_queries_get_their_own_entries,
    parameters_are_part_of_the_key,
);
