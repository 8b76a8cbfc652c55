#[macro_use]
mod fmt;
use fmt::ToSql;

mod delim;
use delim::{Comma, Delimited};

mod flavor;

mod ident;
use ident::Ident;

mod params;
pub use params::{Params, Placeholder};

// Fragment serializers
mod expr;
mod limit;
mod lock;
mod statement;

use crate::stmt::Statement;

use indexmap::IndexMap;
use keel_core::{
    driver::{Capability, DatabaseKind},
    stmt::Value,
    Error, Result,
};
use std::collections::HashMap;

/// Serialize a statement to a SQL string for one database.
#[derive(Debug, Clone, Copy)]
pub struct Serializer<'a> {
    /// The capability of the target database decides quoting, placeholder
    /// style and every dialect-specific clause.
    capability: &'a Capability,
}

struct Formatter<'a, T> {
    /// Handle to the serializer
    serializer: &'a Serializer<'a>,

    /// Where to write the serialized SQL
    dst: &'a mut String,

    /// Where to store positional parameters
    params: &'a mut T,

    /// Named parameter values referenced by the statement
    named: &'a IndexMap<String, Value>,

    /// Placeholders already assigned to named parameters, for dialects that
    /// can reference one parameter several times.
    bound: HashMap<String, Placeholder>,

    /// Writes named parameters back as `:name` instead of binding them.
    unbound: bool,

    /// First error hit while serializing
    error: Option<Error>,
}

impl<'a> Serializer<'a> {
    pub fn new(capability: &'a Capability) -> Serializer<'a> {
        Serializer { capability }
    }

    pub fn capability(&self) -> &'a Capability {
        self.capability
    }

    pub fn kind(&self) -> DatabaseKind {
        self.capability.kind
    }

    /// Serializes `stmt`, binding named parameters from `named` into
    /// `params` in placeholder order.
    pub fn serialize(
        &self,
        stmt: &Statement,
        named: &IndexMap<String, Value>,
        params: &mut impl Params,
    ) -> Result<String> {
        self.serialize_impl(stmt, named, params, false)
    }

    /// Serializes `stmt` leaving named parameters as `:name` / `:...name`.
    ///
    /// The text can be embedded in a raw fragment of another query, which
    /// binds the parameters when it is serialized itself.
    pub fn serialize_unbound(&self, stmt: &Statement) -> Result<String> {
        let named = IndexMap::new();
        let mut params: Vec<Value> = vec![];
        self.serialize_impl(stmt, &named, &mut params, true)
    }

    fn serialize_impl(
        &self,
        stmt: &Statement,
        named: &IndexMap<String, Value>,
        params: &mut impl Params,
        unbound: bool,
    ) -> Result<String> {
        if !self.capability.sql {
            return Err(Error::unsupported_feature(format!(
                "query builders are not supported by {:?}",
                self.kind()
            )));
        }

        let mut ret = String::new();

        let mut fmt = Formatter {
            serializer: self,
            dst: &mut ret,
            params,
            named,
            bound: HashMap::new(),
            unbound,
            error: None,
        };

        stmt.to_sql(&mut fmt);

        match fmt.error {
            Some(err) => Err(err),
            None => Ok(ret),
        }
    }

    /// Quotes one identifier for this dialect.
    pub fn escape(&self, ident: &str) -> String {
        let quote = if self.kind().is_mysql_family() {
            '`'
        } else {
            '"'
        };
        let doubled: String = [quote, quote].iter().collect();
        format!(
            "{quote}{}{quote}",
            ident.replace(quote, &doubled)
        )
    }
}

impl<T: Params> Formatter<'_, T> {
    /// Records an error; serialization carries on but the result is discarded.
    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn is_postgres_family(&self) -> bool {
        self.serializer.kind().is_postgres_family()
    }

    fn is_mysql_family(&self) -> bool {
        self.serializer.kind().is_mysql_family()
    }

    /// Writes the placeholder(s) for a named parameter. Spread parameters
    /// expand list values into one placeholder per element.
    fn param(&mut self, name: &str, spread: bool) {
        if self.unbound {
            let prefix = if spread { ":..." } else { ":" };
            fmt!(self, prefix name);
            return;
        }

        let named = self.named;
        let Some(value) = named.get(name) else {
            self.fail(Error::invalid_parameter(
                name,
                "is referenced by the query but has no value",
            ));
            fmt!(self, ":" name);
            return;
        };

        match value {
            Value::List(items) if spread => {
                if items.is_empty() {
                    fmt!(self, "NULL");
                    return;
                }

                let placeholders: Vec<Placeholder> =
                    items.iter().map(|item| self.params.push(item)).collect();
                fmt!(self, Comma(placeholders));
            }
            value => {
                if self.is_postgres_family() {
                    if let Some(placeholder) = self.bound.get(name).copied() {
                        fmt!(self, placeholder);
                        return;
                    }
                }

                let placeholder = self.params.push(value);
                self.bound.insert(name.to_string(), placeholder);
                fmt!(self, placeholder);
            }
        }
    }
}

impl ToSql for &Statement {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self {
            Statement::Select(stmt) => stmt.to_sql(f),
            Statement::Insert(stmt) => stmt.to_sql(f),
            Statement::Update(stmt) => stmt.to_sql(f),
            Statement::Delete(stmt) => stmt.to_sql(f),
        }
    }
}
