use super::*;
use crate::{driver::Capability, hydrate::EntityValue, test_util, Row};

use pretty_assertions::assert_eq;
use std_util::prelude::*;

const POST_COLUMNS: &str = r#""post"."id" AS "post_id", "post"."title" AS "post_title", "post"."version" AS "post_version", "post"."deletedAt" AS "post_deletedAt""#;

#[test]
fn entity_columns_are_read_back_under_prefixed_aliases() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let sql = assert_ok!(db.select("Tag", "tag").get_sql());

    assert_eq!(
        sql,
        r#"SELECT "tag"."id" AS "tag_id", "tag"."label" AS "tag_label" FROM "tag" "tag" ORDER BY "tag"."label" ASC"#
    );
}

#[test]
fn soft_deleted_rows_are_filtered_unless_requested() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let qb = db
        .select("Post", "post")
        .where_("post.title = :title")
        .set_parameter("title", "Hello");

    let (sql, params) = assert_ok!(qb.get_query_and_parameters());
    assert_eq!(
        sql,
        format!(
            r#"SELECT {POST_COLUMNS} FROM "post" "post" WHERE ("post"."title" = $1) AND ("post"."deletedAt" IS NULL)"#
        )
    );
    assert_eq!(params, vec![Value::from("Hello")]);

    let sql = assert_ok!(qb.with_deleted().get_sql());
    assert!(sql.ends_with(r#"WHERE "post"."title" = $1"#), "{sql}");
}

#[test]
fn skip_and_take_without_joins_become_limit_and_offset() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let sql = assert_ok!(db.select("Tag", "tag").skip(5).take(10).get_sql());
    assert!(sql.ends_with(r#"ORDER BY "tag"."label" ASC LIMIT 10 OFFSET 5"#), "{sql}");

    let (db, _) = test_util::db(&Capability::SQLITE);
    let sql = assert_ok!(db.select("Tag", "tag").skip(5).get_sql());
    assert!(sql.ends_with("LIMIT -1 OFFSET 5"), "{sql}");
}

#[test]
fn get_query_is_repeatable_and_clones_are_independent() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let base = db.select("Tag", "tag").where_("tag.label = :label");

    let first = assert_ok!(base.get_query());
    let second = assert_ok!(base.get_query());
    assert_eq!(first, second);
    assert!(first.contains(r#""tag"."label" = :label"#), "{first}");

    let narrowed = base.clone().and_where("tag.id > 3").take(1);
    assert_eq!(assert_ok!(base.get_query()), first);
    assert_ne!(assert_ok!(narrowed.get_query()), first);
}

#[test]
fn unknown_aliases_fail_at_build_time() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let qb = db
        .select("Post", "post")
        .load_relation_count_and_map("author.postCount", "author.posts");
    assert_err!(qb.get_query(), Error::is_alias_not_found);
}

#[test]
fn lock_clauses_follow_the_dialect() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let sql = assert_ok!(db
        .select("Tag", "tag")
        .set_lock(LockMode::PessimisticWrite)
        .set_lock_tables(["tag"])
        .get_sql());
    assert!(sql.ends_with(r#" FOR UPDATE OF "tag""#), "{sql}");

    let (db, _) = test_util::db(&Capability::MYSQL);
    let sql = assert_ok!(db
        .select("Tag", "tag")
        .set_lock(LockMode::PessimisticPartialWrite)
        .get_sql());
    assert!(sql.ends_with(" FOR UPDATE SKIP LOCKED"), "{sql}");

    let (db, _) = test_util::db(&Capability::SQLITE);
    assert_err!(
        db.select("Tag", "tag")
            .set_lock(LockMode::PessimisticWriteOrFail)
            .get_sql(),
        Error::is_lock_not_supported_on_given_driver
    );

    let (db, _) = test_util::db(&Capability::MYSQL);
    assert_err!(
        db.select("Tag", "tag")
            .set_lock(LockMode::PessimisticRead)
            .set_lock_tables(["tag"])
            .get_sql(),
        Error::is_unsupported_feature
    );
}

#[tokio::test]
async fn pessimistic_locks_need_a_transaction() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    let qb = db.select("Tag", "tag").set_lock(LockMode::PessimisticWrite);

    assert_err!(qb.get_many().await, Error::is_pessimistic_lock_transaction_required);
    assert!(script.sql().is_empty());
    assert_eq!(script.released.load(std::sync::atomic::Ordering::SeqCst), 1);

    assert_ok!(qb.use_transaction(true).get_many().await);
    assert_eq!(script.sql().len(), 1);
}

#[tokio::test]
async fn optimistic_locks_only_apply_to_get_one() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let qb = db
        .select("Post", "post")
        .set_lock(LockMode::Optimistic(Value::from(1)));

    assert_err!(qb.get_many().await, Error::is_optimistic_lock_can_not_be_used);
    assert_err!(qb.get_count().await, Error::is_optimistic_lock_can_not_be_used);

    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    assert_err!(
        db.select("Tag", "tag")
            .set_lock(LockMode::Optimistic(Value::from(1)))
            .get_one()
            .await,
        Error::is_no_version_or_update_date_column
    );
}

#[tokio::test]
async fn entity_pagination_with_joins_runs_two_queries() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    script.push_rows(vec![
        Row::new().with("ids_post_id", 3),
        Row::new().with("ids_post_id", 4),
    ]);
    script.push_rows(vec![
        Row::new()
            .with("post_id", 3)
            .with("post_title", "a")
            .with("category_id", 7)
            .with("category_name", "rust"),
        Row::new()
            .with("post_id", 3)
            .with("post_title", "a")
            .with("category_id", 8)
            .with("category_name", "sql"),
        Row::new()
            .with("post_id", 4)
            .with("post_title", "b")
            .with("category_id", Value::Null)
            .with("category_name", Value::Null),
    ]);

    let posts = assert_ok!(
        db.select("Post", "post")
            .left_join_and_select("post.categories", "category")
            .order_by("post.id", OrderDirection::Desc)
            .skip(5)
            .take(10)
            .get_many()
            .await
    );

    let sql = script.sql();
    assert_eq!(sql.len(), 2);
    assert!(
        sql[0].starts_with(r#"SELECT DISTINCT "distinctAlias"."post_id" AS "ids_post_id" FROM (SELECT "#),
        "{}",
        sql[0]
    );
    assert!(
        sql[0].ends_with(r#") "distinctAlias" ORDER BY "distinctAlias"."post_id" DESC LIMIT 10 OFFSET 5"#),
        "{}",
        sql[0]
    );
    assert!(
        sql[0].contains(r#"LEFT JOIN "post_categories_category" "post_category" ON "post_category"."postId" = "post"."id""#),
        "{}",
        sql[0]
    );

    assert!(
        sql[1].contains(r#"WHERE ("post"."deletedAt" IS NULL) AND ("post"."id" IN ($1, $2))"#),
        "{}",
        sql[1]
    );
    assert!(sql[1].ends_with(r#"ORDER BY "post"."id" DESC"#), "{}", sql[1]);
    assert_eq!(script.params(1), vec![Value::from(3), Value::from(4)]);

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].list("categories").map(<[EntityValue]>::len), Some(2));
    assert_eq!(posts[1].list("categories").map(<[EntityValue]>::len), Some(0));
}

#[tokio::test]
async fn entity_pagination_stops_when_no_ids_match() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);

    let posts = assert_ok!(
        db.select("Post", "post")
            .left_join_and_select("post.categories", "category")
            .take(10)
            .get_many()
            .await
    );

    assert!(posts.is_empty());
    assert_eq!(script.sql().len(), 1);
}

#[tokio::test]
async fn counts_are_distinct_under_joins() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    script.push_rows(vec![Row::new().with("cnt", 7)]);
    script.push_rows(vec![Row::new().with("cnt", 2)]);

    let count = assert_ok!(
        db.select("Post", "post")
            .left_join("post.categories", "category")
            .order_by("post.title", OrderDirection::Asc)
            .take(1)
            .get_count()
            .await
    );
    assert_eq!(count, 7);

    let count = assert_ok!(db.select("Tag", "tag").skip(3).get_count().await);
    assert_eq!(count, 2);

    let sql = script.sql();
    assert!(
        sql[0].starts_with(r#"SELECT COUNT(DISTINCT("post"."id")) AS "cnt" FROM "post" "post""#),
        "{}",
        sql[0]
    );
    assert!(!sql[0].contains("ORDER BY"));
    assert!(!sql[0].contains("LIMIT"));
    assert_eq!(sql[1], r#"SELECT COUNT(1) AS "cnt" FROM "tag" "tag""#);
}

#[tokio::test]
async fn exists_wraps_the_query() {
    let (db, script) = test_util::db(&Capability::SQLITE);
    script.push_rows(vec![Row::new().with("row_exists", 1)]);

    assert!(assert_ok!(db.select("Tag", "tag").get_exists().await));
    assert!(!assert_ok!(db.select("Tag", "tag").get_exists().await));

    let sql = script.sql();
    assert!(
        sql[0].starts_with(r#"SELECT 1 AS "row_exists" FROM (SELECT 1 AS "dummy_column") "dummy_table" WHERE EXISTS (SELECT "#),
        "{}",
        sql[0]
    );
    assert!(sql[0].ends_with(") LIMIT 1"), "{}", sql[0]);
}

#[tokio::test]
async fn get_one_or_fail_reports_the_entity() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let err = assert_err!(db.select("Tag", "tag").where_in_ids([9]).get_one_or_fail().await);
    assert!(err.is_entity_not_found());
    assert!(err.to_string().contains("Tag"), "{err}");
}

#[tokio::test]
async fn relation_counts_are_mapped_onto_owners() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    script.push_rows(vec![
        Row::new().with("user_id", 1).with("user_name", "ada"),
        Row::new().with("user_id", 2).with("user_name", "bob"),
    ]);
    script.push_rows(vec![Row::new().with("parentId", 1).with("cnt", 3)]);

    let users = assert_ok!(
        db.select("User", "user")
            .load_relation_count_and_map("user.photoCount", "user.photos")
            .get_many()
            .await
    );

    let sql = script.sql();
    assert_eq!(sql.len(), 2);
    assert!(sql[1].contains(r#"GROUP BY "user_Photo_rc"."userId""#), "{}", sql[1]);
    assert_eq!(script.params(1), vec![Value::from(1), Value::from(2)]);

    assert_eq!(users[0].value("photoCount"), Some(&Value::from(3)));
    assert_eq!(users[1].value("photoCount"), Some(&Value::from(0)));
}

#[tokio::test]
async fn relation_ids_are_mapped_onto_owners() {
    let (db, script) = test_util::db(&Capability::POSTGRESQL);
    script.push_rows(vec![Row::new().with("post_id", 1).with("post_title", "a")]);
    script.push_rows(vec![
        Row::new().with("owner_0", 1).with("id_0", 7),
        Row::new().with("owner_0", 1).with("id_0", 8),
    ]);

    let posts = assert_ok!(
        db.select("Post", "post")
            .load_relation_id_and_map("post.categoryIds", "post.categories")
            .get_many()
            .await
    );

    assert_eq!(script.sql().len(), 2);
    let ids: Vec<Value> = assert_some!(posts[0].list("categoryIds"))
        .iter()
        .filter_map(EntityValue::as_value)
        .cloned()
        .collect();
    assert_eq!(ids, vec![Value::from(7), Value::from(8)]);
}
