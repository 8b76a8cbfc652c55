use tests::prelude::*;

use pretty_assertions::assert_eq;

fn page(test: &DbTest, ids: &[i64], total: i64) {
    test.push_rows(ids.iter().map(|id| Row::new().with("ids_article_id", *id)).collect());
    test.push_rows(
        ids.iter()
            .map(|id| {
                Row::new()
                    .with("article_id", *id)
                    .with("article_title", format!("article {id}"))
                    .with("label_id", *id * 10)
                    .with("label_name", "news")
            })
            .collect(),
    );
    test.push_rows(vec![Row::new().with("cnt", total)]);
}

async fn count_ignores_the_window(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();

    let query = db
        .select("Article", "article")
        .left_join_and_select("article.labels", "label")
        .order_by("article.id", OrderDirection::Asc);

    page(&test, &[1, 2], 5);
    let (articles, total) = assert_ok!(query.clone().skip(0).take(2).get_many_and_count().await);
    assert_eq!(articles.len(), 2);
    assert_eq!(total, 5);

    page(&test, &[3, 4], 5);
    let (articles, total) = assert_ok!(query.clone().skip(2).take(2).get_many_and_count().await);
    assert_eq!(articles.len(), 2);
    assert_eq!(total, 5);
    assert_eq!(articles[0].value("id"), Some(&Value::from(3)));

    let sql = log.sql();
    assert_eq!(sql.len(), 6);

    // ids, entities, count for each page
    assert_ne!(sql[0], sql[3]);
    assert_eq!(sql[2], sql[5]);
    assert!(sql[2].contains("COUNT(DISTINCT"), "{}", sql[2]);
    assert!(!sql[2].contains("ORDER BY"), "{}", sql[2]);

    // The entity query is bounded by the page's ids
    assert_eq!(log.params(1), vec![Value::from(1), Value::from(2)]);
    assert_eq!(log.params(4), vec![Value::from(3), Value::from(4)]);

    // All three statements of a call share one runner
    assert_eq!(log.connects(), 2);
    assert_eq!(log.releases(), 2);
}

async fn an_empty_page_skips_the_entity_query(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    let log = test.log();
    test.push_rows(vec![]);
    test.push_rows(vec![Row::new().with("cnt", 0)]);

    let (articles, total) = assert_ok!(
        db.select("Article", "article")
            .left_join_and_select("article.labels", "label")
            .skip(40)
            .take(20)
            .get_many_and_count()
            .await
    );
    assert!(articles.is_empty());
    assert_eq!(total, 0);
    assert_eq!(log.queries(), 2);
}

async fn joined_rows_collapse_into_entities(mut test: DbTest) {
    let db = test.setup_db(entities!(fixtures::author(), fixtures::article(), fixtures::label()));
    test.push_rows(vec![
        Row::new()
            .with("article_id", 1)
            .with("article_title", "a")
            .with("label_id", 10)
            .with("label_name", "news"),
        Row::new()
            .with("article_id", 1)
            .with("article_title", "a")
            .with("label_id", 11)
            .with("label_name", "tech"),
        Row::new()
            .with("article_id", 2)
            .with("article_title", "b")
            .with("label_id", Value::Null)
            .with("label_name", Value::Null),
    ]);

    let articles = assert_ok!(
        db.select("Article", "article")
            .left_join_and_select("article.labels", "label")
            .get_many()
            .await
    );

    assert_eq!(articles.len(), 2);
    let labels = assert_some!(articles[0].list("labels"));
    let names: Vec<_> = labels
        .iter()
        .filter_map(|label| label.as_entity())
        .filter_map(|label| label.value("name"))
        .cloned()
        .collect();
    assert_eq!(names, vec![Value::from("news"), Value::from("tech")]);
    assert_eq!(articles[1].list("labels").map(<[_]>::len), Some(0));
}

tests!(
    count_ignores_the_window,
    an_empty_page_skips_the_entity_query,
    joined_rows_collapse_into_entities,
);
