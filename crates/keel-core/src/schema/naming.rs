use std_util::str::{camel_case, snake_case};

use std::fmt::Debug;

/// Derives physical names from entity declarations.
pub trait NamingStrategy: Debug + Send + Sync {
    fn table_name(&self, target_name: &str, user_specified: Option<&str>) -> String {
        match user_specified {
            Some(name) => name.to_string(),
            None => snake_case(target_name),
        }
    }

    fn column_name(
        &self,
        property_name: &str,
        custom_name: Option<&str>,
        embedded_prefixes: &[&str],
    ) -> String {
        let name = custom_name.unwrap_or(property_name);
        if embedded_prefixes.is_empty() {
            return name.to_string();
        }

        let prefix = camel_case(&embedded_prefixes.join("_"));
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!("{prefix}{}{}", first.to_uppercase(), chars.as_str()),
            None => prefix,
        }
    }

    /// Foreign key column of a many-to-one / owning one-to-one relation,
    /// e.g. `author` + `id` -> `authorId`.
    fn join_column_name(&self, relation_name: &str, referenced_column_name: &str) -> String {
        camel_case(&format!("{relation_name}_{referenced_column_name}"))
    }

    /// Junction table name, e.g. `post_categories_category`.
    fn join_table_name(
        &self,
        first_table_name: &str,
        second_table_name: &str,
        first_property_name: &str,
    ) -> String {
        snake_case(&format!(
            "{first_table_name}_{}_{second_table_name}",
            first_property_name.replace('.', "_")
        ))
    }

    /// Junction column pointing at one side, e.g. `post` + `id` -> `postId`.
    fn join_table_column_name(&self, table_name: &str, column_name: &str) -> String {
        camel_case(&format!("{table_name}_{column_name}"))
    }

    /// Alias of a relation joined implicitly from a where map.
    fn join_relation_alias(&self, alias: &str, property_path: &str) -> String {
        format!("{alias}_{}", property_path.replace('.', "_"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNamingStrategy;

impl NamingStrategy for DefaultNamingStrategy {}
