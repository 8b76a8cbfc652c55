use tests::prelude::*;

use pretty_assertions::assert_eq;

fn article_row(version: i64) -> Row {
    Row::new()
        .with("article_id", 1)
        .with("article_title", "Locks")
        .with("article_version", version)
}

async fn matching_version_loads_the_entity(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    test.push_rows(vec![article_row(3)]);

    let article = assert_some!(assert_ok!(
        db.select("Article", "article")
            .where_in_ids([1])
            .set_lock(LockMode::Optimistic(Value::from(3)))
            .get_one()
            .await
    ));
    assert_eq!(article.value("title"), Some(&Value::from("Locks")));
}

async fn stale_version_is_reported(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    test.push_rows(vec![article_row(2)]);

    let err = assert_err!(
        db.select("Article", "article")
            .where_in_ids([1])
            .set_lock(LockMode::Optimistic(Value::from(1)))
            .get_one()
            .await
    );

    let mismatch = assert_some!(err.as_optimistic_lock_version_mismatch());
    assert_eq!(mismatch.entity(), "Article");
    assert_eq!(mismatch.expected(), &Value::from(1));
    assert_eq!(mismatch.actual(), &Value::from(2));
    assert_eq!(
        err.to_string(),
        "the optimistic lock on entity Article failed, version 1 was expected, but is actually 2"
    );
}

async fn no_row_means_nothing_to_check(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));

    let article = assert_ok!(
        db.select("Article", "article")
            .where_in_ids([1])
            .set_lock(LockMode::Optimistic(Value::from(1)))
            .get_one()
            .await
    );
    assert!(article.is_none());
}

async fn only_single_entity_loads_accept_it(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();
    let qb = db
        .select("Article", "article")
        .set_lock(LockMode::Optimistic(Value::from(1)));

    assert_err!(qb.get_many().await, Error::is_optimistic_lock_can_not_be_used);
    assert_err!(qb.get_count().await, Error::is_optimistic_lock_can_not_be_used);
    assert_err!(
        qb.get_many_and_count().await,
        Error::is_optimistic_lock_can_not_be_used
    );
    assert!(log.is_empty());

    assert_err!(
        db.select("Label", "label")
            .set_lock(LockMode::Optimistic(Value::from(1)))
            .get_one()
            .await,
        Error::is_no_version_or_update_date_column
    );
}

tests!(
    matching_version_loads_the_entity,
    stale_version_is_reported,
    no_row_means_nothing_to_check,
    only_single_entity_loads_accept_it,
);
