use crate::{driver::Capability, test_util, Error, Value};

use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std_util::prelude::*;

#[tokio::test]
async fn many_to_many_add_inserts_one_junction_row_per_pair() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    assert_ok!(db.relation("Post", "categories").of(1).add([3, 4]).await);

    assert_eq!(
        script.sql(),
        vec![r#"INSERT INTO "post_categories_category"("postId", "categoryId") VALUES ($1, $2), ($3, $4)"#.to_string()]
    );
    assert_eq!(
        script.params(0),
        vec![Value::from(1), Value::from(3), Value::from(1), Value::from(4)]
    );
}

#[tokio::test]
async fn many_to_many_remove_from_the_inverse_side() {
    let (db, script) = test_util::db(&Capability::SQLITE);
    assert_ok!(db.relation("Category", "posts").of(5).remove([1, 2]).await);

    assert_eq!(
        script.sql(),
        vec![r#"DELETE FROM "post_categories_category" WHERE (("categoryId" = ? AND "postId" = ?) OR ("categoryId" = ? AND "postId" = ?))"#.to_string()]
    );
    assert_eq!(
        script.params(0),
        vec![Value::from(5), Value::from(1), Value::from(5), Value::from(2)]
    );
}

#[tokio::test]
async fn one_to_many_remove_nulls_the_foreign_key() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    assert_ok!(db.relation("User", "photos").of(1).remove([10, 11]).await);

    assert_eq!(
        script.sql(),
        vec![r#"UPDATE "photo" SET "userId" = $1 WHERE (("userId" = $2 AND "id" = $3) OR ("userId" = $4 AND "id" = $5))"#.to_string()]
    );
    assert_eq!(
        script.params(0),
        vec![Value::Null, Value::from(1), Value::from(10), Value::from(1), Value::from(11)]
    );
}

#[tokio::test]
async fn one_to_many_add_points_children_at_the_owner() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    assert_ok!(db.relation("User", "photos").of(1).add([10]).await);

    assert_eq!(
        script.sql(),
        vec![r#"UPDATE "photo" SET "userId" = $1 WHERE "id" IN ($2)"#.to_string()]
    );
    assert_eq!(script.params(0), vec![Value::from(1), Value::from(10)]);
}

#[tokio::test]
async fn one_to_many_add_needs_a_single_owner() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    let err = assert_err!(db.relation("User", "photos").of_many([1, 2]).add([10]).await);
    assert!(err.is_invalid_parameter());
    assert!(script.sql().is_empty());
}

#[tokio::test]
async fn many_to_one_set_updates_every_owner() {
    let (db, script) = test_util::db(&Capability::SQLITE);
    assert_ok!(db.relation("Photo", "user").of_many([10, 11]).set(Some(1)).await);
    assert_ok!(db.relation("Photo", "user").of(12).set::<i32>(None).await);

    assert_eq!(
        script.sql(),
        vec![
            r#"UPDATE "photo" SET "userId" = ? WHERE "id" IN (?, ?)"#.to_string(),
            r#"UPDATE "photo" SET "userId" = ? WHERE "id" IN (?)"#.to_string(),
        ]
    );
    assert_eq!(script.params(0), vec![Value::from(1), Value::from(10), Value::from(11)]);
    assert_eq!(script.params(1), vec![Value::Null, Value::from(12)]);
}

#[tokio::test]
async fn relation_kind_mismatches_are_rejected() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);

    assert_err!(
        db.relation("Post", "categories").of(1).set(Some(3)).await,
        Error::is_unsupported_feature
    );
    assert_err!(
        db.relation("Photo", "user").of(1).remove([3]).await,
        Error::is_unsupported_feature
    );
    assert!(script.sql().is_empty());
}

#[tokio::test]
async fn unknown_relation_and_missing_owner() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);

    assert_err!(
        db.relation("Post", "authors").of(1).add([3]).await,
        Error::is_relation_not_found
    );
    assert_err!(
        db.relation("Post", "categories").add([3]).await,
        Error::is_invalid_parameter
    );
}

#[tokio::test]
async fn add_and_remove_removes_first() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    assert_ok!(
        db.relation("Post", "categories")
            .of(1)
            .add_and_remove([4], [3])
            .await
    );

    let sql = script.sql();
    assert_eq!(sql.len(), 2);
    assert!(sql[0].starts_with("DELETE FROM"));
    assert!(sql[1].starts_with("INSERT INTO"));
}

#[tokio::test]
async fn a_bound_runner_is_not_released() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    let runner = assert_ok!(db.create_query_runner().await);

    assert_ok!(
        db.relation("Post", "categories")
            .of(1)
            .set_query_runner(runner.clone())
            .add_and_remove([4], [3])
            .await
    );

    assert_eq!(script.runners.load(Ordering::SeqCst), 1);
    assert_eq!(script.released.load(Ordering::SeqCst), 0);
    assert!(!runner.is_released());
}
