use tests::prelude::*;

use pretty_assertions::assert_eq;

fn blog(test: &mut DbTest) -> Db {
    test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()))
}

async fn affected_counts_are_reported(mut test: DbTest) {
    let db = blog(&mut test);
    test.push_affected(2);
    test.push_affected(1);
    test.push_affected(3);

    let updated = assert_ok!(
        db.update("Article")
            .set(ValueSet::new().set("title", "Renamed"))
            .where_in_ids([1, 2])
            .update_entity(false)
            .execute()
            .await
    );
    assert_eq!(updated.affected, Some(2));

    let removed = assert_ok!(
        db.soft_delete()
            .from("Article")
            .where_in_ids([1])
            .update_entity(false)
            .execute()
            .await
    );
    assert_eq!(removed.affected, Some(1));

    let deleted = assert_ok!(
        db.delete()
            .from("Label")
            .where_(Where::new().set("name", "old"))
            .execute()
            .await
    );
    assert_eq!(deleted.affected, Some(3));
}

async fn updates_need_values(mut test: DbTest) {
    let db = blog(&mut test);
    let log = test.log();

    assert_err!(
        db.update("Article").where_in_ids([1]).execute().await,
        Error::is_update_values_missing
    );
    assert_err!(
        db.soft_delete().from("Label").execute().await,
        Error::is_missing_delete_date_column
    );
    assert!(log.is_empty());
}

async fn relation_changes_share_the_callers_transaction(mut test: DbTest) {
    let db = blog(&mut test);
    let log = test.log();

    let inner = db.clone();
    assert_ok!(
        db.transaction(|runner| async move {
            inner
                .relation("Article", "labels")
                .of(1)
                .set_query_runner(runner.clone())
                .add_and_remove([3], [2])
                .await?;
            inner
                .relation("Article", "author")
                .of(1)
                .set_query_runner(runner)
                .set(Some(7))
                .await
        })
        .await
    );

    assert_eq!(log.queries(), 3);
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

tests!(
    affected_counts_are_reported,
    updates_need_values,
    relation_changes_share_the_callers_transaction,
);

#[tokio::test]
async fn soft_delete_and_restore_bump_the_version() {
    let mut test = DbTest::new(&Capability::POSTGRESQL);
    let db = blog(&mut test);
    let log = test.log();

    assert_ok!(
        db.soft_delete()
            .from("Article")
            .where_in_ids([4])
            .update_entity(false)
            .execute()
            .await
    );
    assert_ok!(
        db.restore()
            .from("Article")
            .where_in_ids([4])
            .update_entity(false)
            .execute()
            .await
    );

    assert_eq!(
        log.sql(),
        vec![
            r#"UPDATE "article" SET "deletedAt" = CURRENT_TIMESTAMP, "version" = "version" + 1 WHERE "id" IN ($1)"#.to_string(),
            r#"UPDATE "article" SET "deletedAt" = NULL, "version" = "version" + 1 WHERE "id" IN ($1)"#.to_string(),
        ]
    );
}

#[tokio::test]
async fn deleted_rows_stay_hidden_until_asked_for() {
    let mut test = DbTest::new(&Capability::POSTGRESQL);
    let db = blog(&mut test);
    let log = test.log();

    assert_ok!(db.select("Article", "article").get_many().await);
    assert_ok!(db.select("Article", "article").with_deleted().get_many().await);

    let sql = log.sql();
    assert!(sql[0].ends_with(r#"WHERE "article"."deletedAt" IS NULL"#), "{}", sql[0]);
    assert!(!sql[1].contains("WHERE"), "{}", sql[1]);
}
