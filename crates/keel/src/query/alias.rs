use keel_core::{
    schema::{EntityId, EntityMetadata, TablePath},
    Registry,
};
use keel_sql::stmt::Select;

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    From,
    Join,
}

/// A name bound to an entity, a plain table, or a sub-query within one
/// query.
#[derive(Debug, Clone)]
pub struct Alias {
    pub(crate) kind: AliasKind,
    pub(crate) name: String,
    pub(crate) target: AliasTarget,
}

#[derive(Debug, Clone)]
pub(crate) enum AliasTarget {
    Entity(EntityId),
    Table(TablePath),
    Subquery(Box<Select>),
}

impl Alias {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AliasKind {
        self.kind
    }

    pub fn entity(&self) -> Option<EntityId> {
        match self.target {
            AliasTarget::Entity(id) => Some(id),
            _ => None,
        }
    }

    pub fn has_metadata(&self) -> bool {
        self.entity().is_some()
    }

    pub fn metadata<'a>(&self, registry: &'a Registry) -> Option<&'a EntityMetadata> {
        self.entity().map(|id| registry.entity(id))
    }
}

/// Joins alias parts with `_`, replacing the result with a truncated hash
/// when it exceeds the database's identifier limit.
pub(crate) fn build_alias(max_len: Option<usize>, parts: &[&str]) -> String {
    let alias = parts.join("_");

    match max_len {
        Some(max) if max > 0 && alias.len() > max => {
            let digest = Sha256::digest(alias.as_bytes());
            let mut hex = String::with_capacity(digest.len() * 2);
            for b in digest {
                hex.push_str(&format!("{b:02x}"));
            }
            hex.truncate(max);
            hex
        }
        _ => alias,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts() {
        assert_eq!(build_alias(None, &["post", "id"]), "post_id");
        assert_eq!(build_alias(Some(63), &["ids_post", "id"]), "ids_post_id");
    }

    #[test]
    fn hashes_long_aliases() {
        let long = build_alias(Some(30), &["a_really_long_alias_name", "another_column"]);
        assert_eq!(long.len(), 30);
        assert!(long.chars().all(|c| c.is_ascii_hexdigit()));

        // stable across calls
        assert_eq!(
            long,
            build_alias(Some(30), &["a_really_long_alias_name", "another_column"])
        );
    }
}
