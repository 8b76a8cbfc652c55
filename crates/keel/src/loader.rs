//! Side queries: relation ids and counts mapped onto loaded entities, and
//! the related entities of given owners.

mod relation;
pub(crate) use relation::load_related;

mod relation_count;
pub(crate) use relation_count::{load_relation_counts, RelationCounts};

mod relation_id;
pub(crate) use relation_id::{load_relation_ids, RelationIds};

use keel_core::stmt::Value;

use std::collections::HashSet;

/// Distinct keys in first-seen order. Keys with a null part are dropped.
fn distinct_keys(keys: impl IntoIterator<Item = Vec<Value>>) -> Vec<Vec<Value>> {
    let mut seen = HashSet::new();
    let mut out = vec![];

    for key in keys {
        if key.is_empty() || key.iter().any(Value::is_null) {
            continue;
        }

        let fragment = key
            .iter()
            .map(Value::key_fragment)
            .collect::<Vec<_>>()
            .join("_");
        if seen.insert(fragment) {
            out.push(key);
        }
    }

    out
}

/// Matches `columns` of `alias` against `keys`: `alias.col IN (:...owner_ids)`
/// for one column, otherwise an OR of per-key conjunctions. Returns the
/// condition and the parameters it binds. No keys match nothing.
fn owner_condition(
    alias: &str,
    columns: &[&str],
    keys: &[Vec<Value>],
) -> (String, Vec<(String, Value)>) {
    if keys.is_empty() {
        return ("0=1".to_string(), vec![]);
    }

    if let [column] = columns {
        let values = keys.iter().map(|key| key[0].clone()).collect();
        return (
            format!("{alias}.{column} IN (:...owner_ids)"),
            vec![("owner_ids".to_string(), Value::List(values))],
        );
    }

    let mut params = vec![];
    let mut alternatives = vec![];

    for (i, key) in keys.iter().enumerate() {
        let mut operands = vec![];
        for (j, (column, value)) in columns.iter().zip(key).enumerate() {
            let name = format!("owner_{i}_{j}");
            operands.push(format!("{alias}.{column} = :{name}"));
            params.push((name, value.clone()));
        }
        alternatives.push(format!("({})", operands.join(" AND ")));
    }

    (alternatives.join(" OR "), params)
}
