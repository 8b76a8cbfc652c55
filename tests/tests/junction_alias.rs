use tests::prelude::*;

use pretty_assertions::assert_eq;

const JUNCTION: &str = r#""article_labels_label" ""#;

/// Alias given to the junction table in `sql`.
fn junction_alias(sql: &str) -> &str {
    let start = sql.find(JUNCTION).expect("junction table not joined") + JUNCTION.len();
    let len = sql[start..].find('"').expect("unterminated alias");
    &sql[start..start + len]
}

fn setup(test: &mut DbTest, max_alias_length: Option<usize>) -> Db {
    let mut builder = entities!(fixtures::author(), fixtures::article(), fixtures::label());
    if let Some(len) = max_alias_length {
        builder.max_alias_length(len);
    }
    test.setup_db(builder)
}

#[test]
fn both_sides_name_the_junction_alike() {
    let mut test = DbTest::new(&Capability::POSTGRESQL);
    let db = setup(&mut test, None);

    let owning = assert_ok!(db
        .select("Article", "article")
        .left_join_and_select("article.labels", "label")
        .get_sql());
    let inverse = assert_ok!(db
        .select("Label", "label")
        .left_join_and_select("label.articles", "article")
        .get_sql());

    assert_eq!(junction_alias(&owning), "article_label");
    assert_eq!(junction_alias(&inverse), "article_label");

    assert!(
        owning.contains(
            r#"LEFT JOIN "article_labels_label" "article_label" ON "article_label"."articleId" = "article"."id" LEFT JOIN "label" "label" ON "label"."id" = "article_label"."labelId""#
        ),
        "{owning}"
    );
    assert!(
        inverse.contains(
            r#"LEFT JOIN "article_labels_label" "article_label" ON "article_label"."labelId" = "label"."id" LEFT JOIN "article" "article" ON "article"."id" = "article_label"."articleId""#
        ),
        "{inverse}"
    );
}

#[test]
fn hashed_aliases_are_stable() {
    let mut test1 = DbTest::new(&Capability::POSTGRESQL);
    let mut test2 = DbTest::new(&Capability::POSTGRESQL);
    let first = setup(&mut test1, Some(8));
    let second = setup(&mut test2, Some(8));

    let query = |db: &Db| {
        assert_ok!(db
            .select("Article", "article")
            .left_join_and_select("article.labels", "label")
            .get_sql())
    };

    let sql = query(&first);
    assert_eq!(sql, query(&first));
    assert_eq!(sql, query(&second));

    let alias = junction_alias(&sql);
    assert_eq!(alias.len(), 8);
    assert!(alias.chars().all(|c| c.is_ascii_hexdigit()), "{alias}");

    let inverse = assert_ok!(first
        .select("Label", "label")
        .left_join_and_select("label.articles", "article")
        .get_sql());
    assert_eq!(junction_alias(&inverse), alias);
}

#[test]
fn one_relation_joined_twice_keeps_both_joins_apart() {
    let mut test = DbTest::new(&Capability::POSTGRESQL);
    let db = setup(&mut test, None);

    let query = || {
        assert_ok!(db
            .select("Article", "article")
            .left_join_and_select_on("article.labels", "news", "news.name = 'news'")
            .left_join_and_select_on("article.labels", "tech", "tech.name = 'tech'")
            .get_sql())
    };
    let sql = query();

    assert!(
        sql.contains(
            r#"LEFT JOIN "article_labels_label" "article_news" ON "article_news"."articleId" = "article"."id" LEFT JOIN "label" "news" ON "news"."id" = "article_news"."labelId" AND ("news"."name" = 'news')"#
        ),
        "{sql}"
    );
    assert!(
        sql.contains(
            r#"LEFT JOIN "article_labels_label" "article_tech" ON "article_tech"."articleId" = "article"."id" LEFT JOIN "label" "tech" ON "tech"."id" = "article_tech"."labelId" AND ("tech"."name" = 'tech')"#
        ),
        "{sql}"
    );
    assert!(sql.contains(r#""news"."name" AS "news_name""#), "{sql}");
    assert!(sql.contains(r#""tech"."name" AS "tech_name""#), "{sql}");
    assert_eq!(sql, query());
}

#[test]
fn a_join_alias_can_only_be_declared_once() {
    let mut test = DbTest::new(&Capability::POSTGRESQL);
    let db = setup(&mut test, None);

    let err = assert_err!(db
        .select("Article", "article")
        .left_join_and_select("article.labels", "label")
        .left_join_and_select("article.labels", "label")
        .get_sql());
    assert!(err.is_invalid_parameter());

    let err = assert_err!(db
        .select("Article", "article")
        .left_join("Label", "article")
        .get_sql());
    assert!(err.is_invalid_parameter());
}
