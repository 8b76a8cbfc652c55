use crate::{driver::Capability, prelude::*, test_util, Value};

use pretty_assertions::assert_eq;
use std_util::prelude::*;

const TAG: &str = r#"SELECT "tag"."id" AS "tag_id", "tag"."label" AS "tag_label" FROM "tag" "tag""#;
const ORDER: &str = r#" ORDER BY "tag"."label" ASC"#;

fn tag_where(capability: &'static Capability, w: Where) -> (String, Vec<Value>) {
    let (db, _) = test_util::db(capability);
    assert_ok!(db.select("Tag", "tag").where_(w).get_query_and_parameters())
}

#[test]
fn not_equal_is_a_plain_inequality() {
    let (sql, params) = tag_where(
        &Capability::POSTGRESQL,
        Where::new().set("label", not(equal("x"))),
    );
    assert_eq!(sql, format!(r#"{TAG} WHERE "tag"."label" != $1{ORDER}"#));
    assert_eq!(params, vec![Value::from("x")]);
}

#[test]
fn not_wraps_other_operators() {
    let (sql, params) = tag_where(
        &Capability::POSTGRESQL,
        Where::new().set("id", not(in_list([1, 2]))),
    );
    assert_eq!(sql, format!(r#"{TAG} WHERE NOT("tag"."id" IN ($1, $2)){ORDER}"#));
    assert_eq!(params, vec![Value::from(1), Value::from(2)]);

    let (sql, _) = tag_where(&Capability::POSTGRESQL, Where::new().set("label", not(is_null())));
    assert!(sql.contains(r#"WHERE NOT("tag"."label" IS NULL)"#), "{sql}");
}

#[test]
fn null_values_compare_with_is_null() {
    let (sql, params) = tag_where(&Capability::POSTGRESQL, Where::new().set("label", Value::Null));
    assert!(sql.contains(r#"WHERE "tag"."label" IS NULL"#), "{sql}");
    assert!(params.is_empty());
}

#[test]
fn empty_in_list_never_matches() {
    let (sql, params) = tag_where(
        &Capability::POSTGRESQL,
        Where::new().set("id", in_list(Vec::<i32>::new())),
    );
    assert_eq!(sql, format!("{TAG} WHERE 0=1{ORDER}"));
    assert!(params.is_empty());
}

#[test]
fn comparison_operators() {
    let (sql, params) = tag_where(
        &Capability::SQLITE,
        Where::new()
            .set("id", more_than_or_equal(3))
            .set("label", like("a%")),
    );
    assert!(
        sql.contains(r#"WHERE ("tag"."id" >= ? AND "tag"."label" LIKE ?)"#),
        "{sql}"
    );
    assert_eq!(params, vec![Value::from(3), Value::from("a%")]);

    let (sql, params) = tag_where(&Capability::POSTGRESQL, Where::new().set("id", between(1, 9)));
    assert!(sql.contains(r#"WHERE "tag"."id" BETWEEN $1 AND $2"#), "{sql}");
    assert_eq!(params, vec![Value::from(1), Value::from(9)]);
}

#[test]
fn ilike_falls_back_to_upper_outside_postgres() {
    let (sql, _) = tag_where(&Capability::POSTGRESQL, Where::new().set("label", ilike("a%")));
    assert!(sql.contains(r#""tag"."label" ILIKE $1"#), "{sql}");

    let (sql, _) = tag_where(&Capability::SQLITE, Where::new().set("label", ilike("a%")));
    assert!(sql.contains(r#"UPPER("tag"."label") LIKE UPPER(?)"#), "{sql}");
}

#[test]
fn any_binds_one_array_on_postgres() {
    let (sql, params) = tag_where(&Capability::POSTGRESQL, Where::new().set("id", any([1, 2])));
    assert!(sql.contains(r#""tag"."id" = ANY($1)"#), "{sql}");
    assert_eq!(params, vec![Value::List(vec![Value::from(1), Value::from(2)])]);

    let (sql, params) = tag_where(&Capability::MYSQL, Where::new().set("id", any([1, 2])));
    assert!(sql.contains("`tag`.`id` IN (?, ?)"), "{sql}");
    assert_eq!(params, vec![Value::from(1), Value::from(2)]);
}

#[test]
fn raw_operators() {
    let (sql, _) = tag_where(&Capability::POSTGRESQL, Where::new().set("label", raw("'fixed'")));
    assert!(sql.contains(r#"WHERE "tag"."label" = 'fixed'"#), "{sql}");

    let (sql, params) = tag_where(
        &Capability::POSTGRESQL,
        Where::new().set(
            "id",
            raw_with_params(|column| format!("{column} > :min"), [("min", 3)]),
        ),
    );
    assert!(sql.contains(r#"WHERE "tag"."id" > $1"#), "{sql}");
    assert_eq!(params, vec![Value::from(3)]);
}

#[test]
fn unknown_property_fails_at_build_time() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let qb = db
        .select("Tag", "tag")
        .where_(Where::new().set("colour", "red"));
    assert_err!(qb.get_sql(), crate::Error::is_entity_column_not_found);
}

#[test]
fn nested_relation_conditions_join_the_target() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let (sql, params) = assert_ok!(db
        .select("Photo", "photo")
        .where_(Where::new().set("user", Where::new().set("name", "Ann")))
        .get_query_and_parameters());

    assert!(
        sql.contains(r#"LEFT JOIN "user" "photo_user" ON "photo_user"."id" = "photo"."userId""#),
        "{sql}"
    );
    assert!(sql.ends_with(r#"WHERE "photo_user"."name" = $1"#), "{sql}");
    assert_eq!(params, vec![Value::from("Ann")]);
}

#[test]
fn referenced_key_conditions_read_the_foreign_key() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let sql = assert_ok!(db
        .select("Photo", "photo")
        .where_(Where::new().set("user", Where::new().set("id", 4)))
        .get_sql());

    assert!(!sql.contains("JOIN"), "{sql}");
    assert!(sql.ends_with(r#"WHERE "photo"."userId" = $1"#), "{sql}");
}

#[test]
fn to_many_operators_count_related_rows() {
    let (db, _) = test_util::db(&Capability::POSTGRESQL);
    let sql = assert_ok!(db
        .select("User", "user")
        .where_(Where::new().set("photos", more_than(2)))
        .get_sql());

    assert!(
        sql.ends_with(
            r#"WHERE (SELECT COUNT(1) FROM "photo" WHERE "photo"."userId" = "user"."id") > $1"#
        ),
        "{sql}"
    );

    let qb = db
        .select("User", "user")
        .where_(Where::new().set("photos", like("x")));
    assert_err!(qb.get_sql(), crate::Error::is_unsupported_feature);
}

#[test]
fn several_maps_are_alternatives() {
    let (sql, params) = {
        let (db, _) = test_util::db(&Capability::POSTGRESQL);
        assert_ok!(db
            .select("Tag", "tag")
            .where_(vec![
                Where::new().set("label", "a").set("id", 1),
                Where::new().set("label", "b"),
            ])
            .get_query_and_parameters())
    };
    assert!(
        sql.contains(r#"WHERE (("tag"."label" = $1 AND "tag"."id" = $2) OR "tag"."label" = $3)"#),
        "{sql}"
    );
    assert_eq!(params, vec![Value::from("a"), Value::from(1), Value::from("b")]);
}
