//! Query AST that carries CTE definitions.
//!
//! [`QailCmd`] is a small SELECT builder. Each chained call consumes the
//! command and returns a new one, and its [`CteRegistry`] follows the same
//! discipline, so cloning a half-built query and extending both copies is
//! safe.

use serde::Serialize;

use crate::error::CteResult;
use crate::registry::{CteRegistry, WithArg};

/// A SELECT query under construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QailCmd {
    /// Target table name (may be a CTE name)
    pub table: String,
    /// Columns to select; empty selects `*`
    pub columns: Vec<String>,
    /// Cages (filters, sorts, limits)
    pub cages: Vec<Cage>,
    /// WITH definitions rendered ahead of the statement
    #[serde(skip_serializing_if = "CteRegistry::is_empty")]
    pub ctes: CteRegistry,
}

impl QailCmd {
    /// Create a new GET command for the given table.
    pub fn get(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec![],
            cages: vec![],
            ctes: CteRegistry::new(),
        }
    }

    /// Set the columns to select.
    pub fn hook(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add an equality filter.
    pub fn cage(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    /// Add a filter with an explicit operator.
    pub fn filter(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.cages.push(Cage {
            kind: CageKind::Filter,
            conditions: vec![Condition {
                column: column.to_string(),
                op,
                value: value.into(),
            }],
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.cages.push(Cage::bare(CageKind::Limit(n)));
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.cages.push(Cage::bare(CageKind::Offset(n)));
        self
    }

    pub fn sort_asc(self, column: &str) -> Self {
        self.sort(column, SortOrder::Asc)
    }

    pub fn sort_desc(self, column: &str) -> Self {
        self.sort(column, SortOrder::Desc)
    }

    fn sort(mut self, column: &str, order: SortOrder) -> Self {
        self.cages.push(Cage {
            kind: CageKind::Sort(order),
            conditions: vec![Condition {
                column: column.to_string(),
                op: Operator::Eq,
                value: Value::Null,
            }],
        });
        self
    }

    // =========================================================================
    // CTE Builder Methods
    // =========================================================================

    /// Attach a CTE.
    ///
    /// # Example
    ///
    /// ```
    /// use qail_cte::prelude::*;
    ///
    /// let cmd = QailCmd::get("popular_posts")
    ///     .with("popular_posts AS (SELECT * FROM posts WHERE views_count > 100)")?
    ///     .limit(5);
    ///
    /// assert_eq!(
    ///     cmd.to_sql(),
    ///     "WITH popular_posts AS (SELECT * FROM posts WHERE views_count > 100) \
    ///      SELECT * FROM popular_posts LIMIT 5"
    /// );
    /// # Ok::<(), CteError>(())
    /// ```
    pub fn with(self, arg: impl Into<WithArg>) -> CteResult<Self> {
        self.with_args(vec![arg.into()], false)
    }

    /// Attach a CTE and switch the statement to `WITH RECURSIVE`.
    pub fn with_recursive(self, arg: impl Into<WithArg>) -> CteResult<Self> {
        self.with_args(vec![arg.into()], true)
    }

    /// Attach several CTE arguments in one call.
    pub fn with_args(mut self, args: Vec<WithArg>, recursive: bool) -> CteResult<Self> {
        self.ctes = self.ctes.attach(args, recursive)?;
        Ok(self)
    }

    /// Fold another query's filters and CTEs into this one.
    ///
    /// Our CTEs come first. `other`'s filters are ANDed onto ours, so the
    /// result narrows both queries. `other`'s table, columns, sorts and
    /// limits are ignored.
    pub fn merge(mut self, other: &QailCmd) -> Self {
        self.ctes = self.ctes.merge(&other.ctes);
        self.cages.extend(
            other
                .cages
                .iter()
                .filter(|c| c.kind == CageKind::Filter)
                .cloned(),
        );
        self
    }

    pub fn ctes(&self) -> &CteRegistry {
        &self.ctes
    }
}

/// A cage (constraint block) in the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cage {
    pub kind: CageKind,
    /// Conditions within this cage, joined with AND
    pub conditions: Vec<Condition>,
}

impl Cage {
    fn bare(kind: CageKind) -> Self {
        Self {
            kind,
            conditions: vec![],
        }
    }
}

/// The type of cage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CageKind {
    /// WHERE filter
    Filter,
    /// ORDER BY
    Sort(SortOrder),
    /// LIMIT
    Limit(usize),
    /// OFFSET
    Offset(usize),
}

/// Sort order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A single condition within a cage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Fuzzy match -> ILIKE
    Fuzzy,
    IsNull,
    IsNotNull,
}

/// A value in a condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Parameter reference ($1, $2, etc.)
    Param(usize),
    /// SQL function call (e.g., now())
    Function(String),
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Param(n) => write!(f, "${}", n),
            Value::Function(name) => write!(f, "{}()", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CteDefinition;

    #[test]
    fn test_builder_pattern() {
        let cmd = QailCmd::get("users")
            .hook(&["id", "email"])
            .cage("active", true)
            .limit(10);
        assert_eq!(cmd.table, "users");
        assert_eq!(cmd.columns, vec!["id", "email"]);
        assert_eq!(cmd.cages.len(), 2);
        assert!(cmd.ctes().is_empty());
    }

    #[test]
    fn test_base_query_is_not_shared() {
        let base = QailCmd::get("t").with("a AS (SELECT 1)").unwrap();
        let left = base.clone().with("b AS (SELECT 2)").unwrap();
        let right = base.clone().with_recursive("c AS (SELECT 3)").unwrap();

        assert_eq!(base.ctes().names(), vec!["a"]);
        assert_eq!(left.ctes().names(), vec!["a", "b"]);
        assert_eq!(right.ctes().names(), vec!["a", "c"]);
        assert!(!left.ctes().is_recursive());
        assert!(right.ctes().is_recursive());
    }

    #[test]
    fn test_merge_takes_filters_and_ctes() {
        let left = QailCmd::get("t").with("a AS (SELECT 1)").unwrap();
        let right = QailCmd::get("other")
            .with(CteDefinition::sql("b", "SELECT 2"))
            .unwrap()
            .cage("active", true)
            .limit(3);

        let merged = left.merge(&right);
        assert_eq!(merged.table, "t");
        assert_eq!(merged.ctes().names(), vec!["a", "b"]);
        assert_eq!(merged.cages.len(), 1);
    }

    #[test]
    fn test_merged_filters_are_anded() {
        use crate::transpiler::ToSql;

        let left = QailCmd::get("posts").cage("published", true);
        let right = QailCmd::get("posts").filter("views_count", Operator::Gt, 100);

        assert_eq!(
            left.merge(&right).to_sql(),
            "SELECT * FROM posts WHERE published = true AND views_count > 100"
        );
    }

    #[test]
    fn test_value_display_escapes_quotes() {
        assert_eq!(Value::from("O'Brien").to_string(), "'O''Brien'");
    }
}
