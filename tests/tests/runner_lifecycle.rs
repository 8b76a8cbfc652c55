use tests::prelude::*;

use keel::err;
use pretty_assertions::assert_eq;
use tokio_stream::StreamExt;

async fn each_query_borrows_and_returns_one_runner(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();

    assert_ok!(db.select("Label", "label").get_many().await);
    assert_ok!(db.select("Label", "label").get_count().await);

    assert_eq!(log.queries(), 2);
    assert_eq!(log.connects(), 2);
    assert_eq!(log.releases(), 2);
}

async fn a_failed_query_still_releases(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();

    test.push_error(err!("connection reset"));
    let err = assert_err!(db.select("Label", "label").get_many().await);
    assert!(err.to_string().contains("connection reset"), "{err}");

    assert_eq!(log.lifecycle(), vec![DriverOp::Connect, DriverOp::Release]);
}

async fn use_transaction_wraps_the_query(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();

    assert_ok!(
        db.select("Label", "label")
            .use_transaction(true)
            .get_many()
            .await
    );
    assert_eq!(
        log.lifecycle(),
        vec![
            DriverOp::Connect,
            DriverOp::Begin,
            DriverOp::Commit,
            DriverOp::Release
        ]
    );
}

async fn transaction_commits_and_releases(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();
    test.push_rows(vec![Row::new().with("cnt", 4)]);

    let inner = db.clone();
    let count = assert_ok!(
        db.transaction(|runner| async move {
            inner
                .select("Label", "label")
                .set_query_runner(runner)
                .get_count()
                .await
        })
        .await
    );
    assert_eq!(count, 4);

    assert_eq!(log.queries(), 1);
    assert_eq!(
        log.lifecycle(),
        vec![
            DriverOp::Connect,
            DriverOp::Begin,
            DriverOp::Commit,
            DriverOp::Release
        ]
    );
}

async fn transaction_rolls_back_on_error(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();
    test.push_affected(1);
    test.push_error(err!("duplicate key"));

    let inner = db.clone();
    let err = assert_err!(
        db.transaction(|runner| async move {
            inner
                .relation("Article", "labels")
                .of(1)
                .set_query_runner(runner.clone())
                .add([2])
                .await?;
            inner
                .relation("Article", "labels")
                .of(1)
                .set_query_runner(runner)
                .add([3])
                .await
        })
        .await
    );
    assert!(err.to_string().contains("duplicate key"), "{err}");

    assert_eq!(log.queries(), 2);
    assert_eq!(
        log.lifecycle(),
        vec![
            DriverOp::Connect,
            DriverOp::Begin,
            DriverOp::Rollback,
            DriverOp::Release
        ]
    );
}

async fn a_caller_owned_runner_is_left_open(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();

    let runner = assert_ok!(db.create_query_runner().await);
    for _ in 0..3 {
        assert_ok!(
            db.select("Label", "label")
                .set_query_runner(runner.clone())
                .get_many()
                .await
        );
    }

    assert_eq!(log.queries(), 3);
    assert_eq!(log.connects(), 1);
    assert_eq!(log.releases(), 0);
    assert!(!runner.is_released());

    assert_ok!(runner.release().await);
    assert_eq!(log.releases(), 1);
}

async fn a_finished_stream_commits_and_releases(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();
    test.push_rows(vec![Row::new().with("label_id", 1), Row::new().with("label_id", 2)]);

    let rows = assert_ok!(
        db.select("Label", "label")
            .use_transaction(true)
            .stream()
            .await
    );
    let rows: Vec<_> = rows.collect().await;
    assert_eq!(rows.len(), 2);

    assert_eq!(
        log.lifecycle(),
        vec![
            DriverOp::Connect,
            DriverOp::Begin,
            DriverOp::Commit,
            DriverOp::Release
        ]
    );
}

async fn a_dropped_stream_rolls_back_and_releases(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();
    test.push_rows(vec![Row::new().with("label_id", 1), Row::new().with("label_id", 2)]);

    let mut rows = assert_ok!(
        db.select("Label", "label")
            .use_transaction(true)
            .stream()
            .await
    );
    assert_ok!(assert_some!(rows.next().await));
    drop(rows);

    for _ in 0..16 {
        if log.releases() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(log.connects(), 1);
    assert_eq!(
        log.lifecycle(),
        vec![
            DriverOp::Connect,
            DriverOp::Begin,
            DriverOp::Rollback,
            DriverOp::Release
        ]
    );
}

tests!(
    each_query_borrows_and_returns_one_runner,
    a_failed_query_still_releases,
    use_transaction_wraps_the_query,
    transaction_commits_and_releases,
    transaction_rolls_back_on_error,
    a_caller_owned_runner_is_left_open,
    a_finished_stream_commits_and_releases,
    a_dropped_stream_rolls_back_and_releases,
);
