//! Caller-written SQL fragments.
//!
//! Fragments are split into tokens once: quoted literals are copied as they
//! are, `:name` / `:...name` become parameter nodes and `alias.property`
//! words become column nodes. Nothing inside a string literal is ever
//! rewritten.

use super::ExpressionMap;

use keel_core::{
    schema::{Column, EntityMetadata},
    Registry,
};
use keel_sql::stmt::Expr;

/// Lexes `sql` against the aliases of `map`.
pub(crate) fn lex(map: &ExpressionMap, registry: &Registry, sql: &str) -> Expr {
    let mut lexer = Lexer {
        map,
        registry,
        src: sql,
        pos: 0,
        out: vec![],
        text: String::new(),
    };
    lexer.run();
    lexer.finish()
}

struct Lexer<'a> {
    map: &'a ExpressionMap,
    registry: &'a Registry,
    src: &'a str,
    pos: usize,
    out: Vec<Expr>,

    /// Verbatim text not yet flushed to `out`.
    text: String,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '\'' | '"' | '`' => self.quoted(c),
                ':' => self.colon(),
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.word(),
                c if c.is_ascii_digit() => self.number(),
                c => {
                    self.text.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn finish(mut self) -> Expr {
        self.flush();
        match self.out.len() {
            0 => Expr::Raw(String::new()),
            1 => self.out.remove(0),
            _ => Expr::Seq(self.out),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.out.push(Expr::Raw(std::mem::take(&mut self.text)));
        }
    }

    /// Copies a quoted literal; a doubled quote is an escaped quote.
    fn quoted(&mut self, quote: char) {
        let start = self.pos;
        self.pos += quote.len_utf8();

        loop {
            match self.peek() {
                None => break,
                Some(c) if c == quote => {
                    self.pos += c.len_utf8();
                    if self.peek() == Some(quote) {
                        self.pos += quote.len_utf8();
                        continue;
                    }
                    break;
                }
                Some(c) => self.pos += c.len_utf8(),
            }
        }

        self.text.push_str(&self.src[start..self.pos]);
    }

    fn colon(&mut self) {
        let rest = self.rest();

        // Postgres casts
        if rest.starts_with("::") {
            self.text.push_str("::");
            self.pos += 2;
            return;
        }

        let (spread, skip) = if rest[1..].starts_with("...") {
            (true, 4)
        } else {
            (false, 1)
        };

        let name = take_while(&rest[skip..], is_param_char);
        let name = name.trim_end_matches('.');

        if name.is_empty() {
            self.text.push(':');
            self.pos += 1;
            return;
        }

        self.flush();
        self.out.push(if spread {
            Expr::ParamList(name.to_string())
        } else {
            Expr::Param(name.to_string())
        });
        self.pos += skip + name.len();
    }

    fn number(&mut self) {
        let word = take_while(self.rest(), |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        self.text.push_str(word);
        self.pos += word.len();
    }

    fn word(&mut self) {
        let word = take_while(self.rest(), is_word_char);
        self.pos += word.len();

        match self.resolve(word) {
            Some(expr) => {
                self.flush();
                self.out.push(expr);
            }
            None => self.text.push_str(word),
        }
    }

    /// `alias.path` to a column reference, if the alias is mapped and the
    /// path names a column.
    fn resolve(&self, word: &str) -> Option<Expr> {
        let (alias_name, path) = word.split_once('.')?;
        let alias = self.map.find_alias(alias_name).ok()?;
        let metadata = alias.metadata(self.registry)?;
        let column = resolve_path(self.registry, metadata, path)?;

        Some(if self.map.alias_prefixing {
            Expr::column(alias_name, &column.database_name)
        } else {
            Expr::bare_column(&column.database_name)
        })
    }
}

/// Resolves a property path the way conditions refer to it: a relation with
/// one join column, `relation.referencedProperty`, a column property path,
/// then a physical column name.
pub(crate) fn resolve_path<'a>(
    registry: &Registry,
    metadata: &'a EntityMetadata,
    path: &str,
) -> Option<&'a Column> {
    if let Some(relation) = metadata.find_relation_with_property_path(path) {
        if relation.is_with_join_column() && relation.join_columns.len() == 1 {
            return Some(metadata.column(relation.join_columns[0]));
        }
    }

    if let Some((relation_path, referenced)) = path.rsplit_once('.') {
        if let Some(relation) = metadata.find_relation_with_property_path(relation_path) {
            if relation.is_with_join_column() {
                let found = relation
                    .join_columns
                    .iter()
                    .map(|id| metadata.column(*id))
                    .find(|column| {
                        column
                            .referenced_column
                            .is_some_and(|id| registry.column(id).property_path == referenced)
                    });
                if found.is_some() {
                    return found;
                }
            }
        }
    }

    metadata
        .columns
        .iter()
        .find(|column| column.property_path == path)
        .or_else(|| metadata.find_column_with_database_name(path))
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn take_while(s: &str, f: impl Fn(char) -> bool) -> &str {
    let end = s.find(|c: char| !f(c)).unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{AliasKind, AliasTarget, QueryType};
    use keel_core::{
        driver::Capability,
        schema::{Builder, ColumnDef, EntityDef, RelationDef},
    };
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        Builder::new()
            .entity(
                EntityDef::new("User")
                    .column(ColumnDef::primary_generated("id"))
                    .column(ColumnDef::new("name", "varchar")),
            )
            .entity(
                EntityDef::new("Post")
                    .column(ColumnDef::primary_generated("id"))
                    .column(ColumnDef::new("title", "varchar").name("post_title"))
                    .relation(RelationDef::many_to_one("author", "User")),
            )
            .build(&Capability::POSTGRESQL)
            .unwrap()
    }

    fn map(registry: &Registry, prefixing: bool) -> ExpressionMap {
        let mut map = ExpressionMap::new(QueryType::Select);
        map.alias_prefixing = prefixing;
        let id = registry.find("Post").unwrap().id;
        map.create_alias(AliasKind::From, "post", AliasTarget::Entity(id));
        map.main_alias = Some("post".to_string());
        map
    }

    #[test]
    fn columns_and_params() {
        let registry = registry();
        let map = map(&registry, true);

        let expr = lex(&map, &registry, "post.title = :title AND post.id IN (:...ids)");
        assert_eq!(
            expr,
            Expr::Seq(vec![
                Expr::column("post", "post_title"),
                Expr::raw(" = "),
                Expr::param("title"),
                Expr::raw(" AND "),
                Expr::column("post", "id"),
                Expr::raw(" IN ("),
                Expr::ParamList("ids".to_string()),
                Expr::raw(")"),
            ])
        );
    }

    #[test]
    fn relation_paths_resolve_to_join_columns() {
        let registry = registry();
        let map = map(&registry, true);

        assert_eq!(
            lex(&map, &registry, "post.author"),
            Expr::column("post", "authorId")
        );
        assert_eq!(
            lex(&map, &registry, "post.author.id"),
            Expr::column("post", "authorId")
        );
    }

    #[test]
    fn literals_are_left_alone() {
        let registry = registry();
        let map = map(&registry, true);

        let expr = lex(&map, &registry, "post.title = 'post.title :x' AND 1.5 > 0");
        assert_eq!(
            expr,
            Expr::Seq(vec![
                Expr::column("post", "post_title"),
                Expr::raw(" = 'post.title :x' AND 1.5 > 0"),
            ])
        );
    }

    #[test]
    fn casts_and_unknown_words() {
        let registry = registry();
        let map = map(&registry, true);

        assert_eq!(
            lex(&map, &registry, "other.title::text"),
            Expr::raw("other.title::text")
        );
        assert_eq!(
            lex(&map, &registry, "post.nope"),
            Expr::raw("post.nope")
        );
    }

    #[test]
    fn unprefixed_columns() {
        let registry = registry();
        let map = map(&registry, false);
        assert_eq!(
            lex(&map, &registry, "post.title"),
            Expr::bare_column("post_title")
        );
    }

    #[test]
    fn trailing_dot_is_not_part_of_param() {
        let registry = registry();
        let map = map(&registry, true);
        assert_eq!(
            lex(&map, &registry, ":id."),
            Expr::Seq(vec![Expr::param("id"), Expr::raw(".")])
        );
    }
}
