//! CTE definition registry.
//!
//! A [`CteRegistry`] holds the named `WITH` definitions attached to one
//! query. Registries are values: [`CteRegistry::attach`] and
//! [`CteRegistry::merge`] return a new registry and leave the receiver
//! untouched, so a query reused as the base of several chains never sees
//! definitions added by another chain.
//!
//! ```
//! use qail_cte::registry::{CteRegistry, WithArg};
//!
//! let ctes = CteRegistry::new()
//!     .attach(vec![WithArg::from("recent AS (SELECT * FROM posts LIMIT 10)")], false)
//!     .unwrap();
//!
//! assert_eq!(ctes.render(), "WITH recent AS (SELECT * FROM posts LIMIT 10)");
//! ```

use serde::Serialize;

use crate::ast::QailCmd;
use crate::error::{CteError, CteResult};
use crate::parser::parse_cte;
use crate::transpiler::{ToSql, quote_identifier};

/// The SQL bound to a CTE name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CteBody {
    /// A sub-query built with the query builder
    Query(Box<QailCmd>),
    /// A raw SQL expression, used verbatim
    Sql(String),
}

impl ToSql for CteBody {
    fn to_sql(&self) -> String {
        match self {
            CteBody::Query(cmd) => cmd.to_sql(),
            CteBody::Sql(sql) => sql.clone(),
        }
    }
}

/// A named CTE, ready to be rendered as `name AS (body)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CteDefinition {
    pub name: String,
    pub body: CteBody,
}

impl CteDefinition {
    pub fn new(name: impl Into<String>, body: CteBody) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// A CTE whose body is raw SQL.
    pub fn sql(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(name, CteBody::Sql(sql.into()))
    }

    /// A CTE whose body is a builder sub-query.
    pub fn query(name: impl Into<String>, cmd: QailCmd) -> Self {
        Self::new(name, CteBody::Query(Box::new(cmd)))
    }

    /// Parse a `name AS (SELECT ...)` string into a definition.
    pub fn parse(input: &str) -> CteResult<Self> {
        parse_cte(input).map(|parsed| parsed.into_definition())
    }
}

impl std::fmt::Display for CteDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} AS ({})", quote_identifier(&self.name), self.body.to_sql())
    }
}

/// A CTE body as handed to `.with()`, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum WithValue {
    /// No body. Always rejected.
    Null,
    Sql(String),
    Query(Box<QailCmd>),
    /// A pre-built definition bound under the mapping key; its own name is ignored.
    Node(CteDefinition),
    /// Several bodies for one name. Always rejected.
    List(Vec<WithValue>),
}

impl From<&str> for WithValue {
    fn from(s: &str) -> Self {
        WithValue::Sql(s.to_string())
    }
}

impl From<String> for WithValue {
    fn from(s: String) -> Self {
        WithValue::Sql(s)
    }
}

impl From<QailCmd> for WithValue {
    fn from(cmd: QailCmd) -> Self {
        WithValue::Query(Box::new(cmd))
    }
}

impl From<CteDefinition> for WithValue {
    fn from(def: CteDefinition) -> Self {
        WithValue::Node(def)
    }
}

impl<T: Into<WithValue>> From<Option<T>> for WithValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(WithValue::Null, Into::into)
    }
}

impl<T: Into<WithValue>> From<Vec<T>> for WithValue {
    fn from(values: Vec<T>) -> Self {
        WithValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// One argument to `.with()`.
#[derive(Debug, Clone, PartialEq)]
pub enum WithArg {
    /// Names mapped to bodies, in declaration order
    Map(Vec<(String, WithValue)>),
    /// A `name AS (SELECT ...)` string
    Sql(String),
    /// A pre-built definition carrying its own name
    Node(CteDefinition),
    /// Several nodes or strings. Mappings may not appear here.
    List(Vec<WithArg>),
}

impl WithArg {
    /// Build a mapping argument from `(name, body)` pairs.
    ///
    /// ```
    /// use qail_cte::registry::WithArg;
    ///
    /// let arg = WithArg::map([("a", "SELECT 1"), ("b", "SELECT 2")]);
    /// assert!(matches!(arg, WithArg::Map(ref entries) if entries.len() == 2));
    /// ```
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<WithValue>,
    {
        WithArg::Map(
            entries
                .into_iter()
                .map(|(name, body)| (name.into(), body.into()))
                .collect(),
        )
    }
}

impl From<&str> for WithArg {
    fn from(s: &str) -> Self {
        WithArg::Sql(s.to_string())
    }
}

impl From<String> for WithArg {
    fn from(s: String) -> Self {
        WithArg::Sql(s)
    }
}

impl From<CteDefinition> for WithArg {
    fn from(def: CteDefinition) -> Self {
        WithArg::Node(def)
    }
}

impl<T: Into<WithArg>> From<Vec<T>> for WithArg {
    fn from(items: Vec<T>) -> Self {
        WithArg::List(items.into_iter().map(Into::into).collect())
    }
}

/// Ordered set of CTE definitions for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CteRegistry {
    definitions: Vec<CteDefinition>,
    recursive: bool,
}

impl CteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a registry with `args` appended.
    ///
    /// Every argument is validated before anything is added, so an error
    /// leaves no partial state behind. A definition equal to one already
    /// present is skipped. `recursive` turns on `WITH RECURSIVE` for good.
    pub fn attach(&self, args: Vec<WithArg>, recursive: bool) -> CteResult<Self> {
        let incoming = normalize(args)?;

        let mut next = self.clone();
        next.recursive |= recursive;
        for def in incoming {
            next.absorb(def);
        }

        tracing::debug!(
            "Attached CTEs: {} definition(s), recursive={}",
            next.definitions.len(),
            next.recursive
        );
        Ok(next)
    }

    /// Combine two registries: ours first, then theirs that we lack.
    ///
    /// Same-name definitions with different bodies are both kept. The
    /// statement then carries a duplicate CTE name and the database rejects
    /// it; see [`CteRegistry::conflicts`].
    pub fn merge(&self, other: &CteRegistry) -> Self {
        let mut next = self.clone();
        next.recursive |= other.recursive;
        for def in &other.definitions {
            next.absorb(def.clone());
        }

        tracing::debug!(
            "Merged CTE registries: {} + {} -> {} definition(s)",
            self.definitions.len(),
            other.definitions.len(),
            next.definitions.len()
        );
        next
    }

    fn absorb(&mut self, def: CteDefinition) {
        if self.definitions.contains(&def) {
            return;
        }
        if self.contains(&def.name) {
            tracing::warn!(
                "CTE '{}' declared again with a different body; the database will reject the statement",
                def.name
            );
        }
        self.definitions.push(def);
    }

    /// Render the `WITH [RECURSIVE] ...` prologue, or `""` when empty.
    pub fn render(&self) -> String {
        if self.definitions.is_empty() {
            return String::new();
        }

        let mut sql = String::from("WITH ");
        if self.recursive {
            sql.push_str("RECURSIVE ");
        }
        let parts: Vec<String> = self.definitions.iter().map(|d| d.to_string()).collect();
        sql.push_str(&parts.join(", "));
        sql
    }

    /// The prologue to prepend to a statement, if there is one.
    pub fn prologue(&self) -> Option<String> {
        if self.definitions.is_empty() {
            None
        } else {
            Some(self.render())
        }
    }

    pub fn definitions(&self) -> &[CteDefinition] {
        &self.definitions
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.iter().any(|d| d.name == name)
    }

    /// First definition declared under `name`.
    pub fn get(&self, name: &str) -> Option<&CteDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Distinct names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.definitions.len());
        for def in &self.definitions {
            if !names.contains(&def.name.as_str()) {
                names.push(&def.name);
            }
        }
        names
    }

    /// Names declared more than once with different bodies.
    pub fn conflicts(&self) -> Vec<&str> {
        self.names()
            .into_iter()
            .filter(|name| self.definitions.iter().filter(|d| d.name == *name).count() > 1)
            .collect()
    }
}

impl std::fmt::Display for CteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Resolve `.with()` arguments into definitions, or fail without side effects.
fn normalize(args: Vec<WithArg>) -> CteResult<Vec<CteDefinition>> {
    if args.is_empty() {
        return Err(CteError::NoArguments);
    }

    let mut defs = Vec::new();
    for arg in args {
        collect_arg(arg, false, &mut defs)?;
    }
    Ok(defs)
}

fn collect_arg(arg: WithArg, nested: bool, defs: &mut Vec<CteDefinition>) -> CteResult<()> {
    match arg {
        WithArg::Map(_) if nested => return Err(CteError::NestedMapping),
        WithArg::List(_) if nested => return Err(CteError::NestedList),
        WithArg::Map(entries) => {
            for (name, body) in entries {
                defs.push(definition_from_value(name, body)?);
            }
        }
        WithArg::Sql(text) => defs.push(CteDefinition::parse(&text)?),
        WithArg::Node(def) => defs.push(validate(def.name, def.body)?),
        WithArg::List(items) => {
            for item in items {
                collect_arg(item, true, defs)?;
            }
        }
    }
    Ok(())
}

fn definition_from_value(name: String, value: WithValue) -> CteResult<CteDefinition> {
    let body = match value {
        WithValue::Null => return Err(CteError::NilBody(name)),
        WithValue::Sql(sql) => CteBody::Sql(sql),
        WithValue::Query(cmd) => CteBody::Query(cmd),
        WithValue::Node(def) => def.body,
        WithValue::List(_) => return Err(CteError::CollectionBody(name)),
    };
    validate(name, body)
}

/// Shared checks for every definition, however it was supplied.
fn validate(name: String, body: CteBody) -> CteResult<CteDefinition> {
    if name.trim().is_empty() {
        return Err(CteError::EmptyName);
    }
    if let CteBody::Sql(sql) = &body
        && sql.trim().is_empty()
    {
        return Err(CteError::NilBody(name));
    }
    Ok(CteDefinition { name, body })
}
