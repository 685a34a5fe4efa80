//! SQL Transpiler for QAIL AST.
//!
//! Converts query commands into SQL strings, prefixed with the
//! `WITH [RECURSIVE] ...` prologue when CTEs are attached.

use crate::ast::*;
use crate::registry::CteRegistry;

/// Trait for converting AST nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

impl ToSql for QailCmd {
    fn to_sql(&self) -> String {
        let select = self.to_select_sql();
        match self.ctes.prologue() {
            Some(prologue) => format!("{} {}", prologue, select),
            None => select,
        }
    }
}

impl ToSql for CteRegistry {
    fn to_sql(&self) -> String {
        self.render()
    }
}

/// Words that must be quoted to be used as a CTE name.
const RESERVED_WORDS: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "both", "by", "case", "cast", "check",
    "column", "constraint", "create", "cross", "current_date", "current_user", "default",
    "delete", "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for",
    "foreign", "from", "full", "grant", "group", "having", "in", "inner", "insert",
    "intersect", "into", "is", "join", "leading", "left", "like", "limit", "natural", "not",
    "null", "offset", "on", "only", "or", "order", "outer", "primary", "recursive",
    "references", "returning", "right", "select", "set", "some", "table", "then", "to",
    "trailing", "true", "union", "unique", "update", "user", "using", "values", "when",
    "where", "window", "with",
];

/// Quote an identifier unless it is a plain, non-reserved word.
///
/// Plain identifiers stay bare so the database still folds their case the
/// way it does everywhere else in the statement.
pub fn quote_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str());

    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

impl QailCmd {
    /// Generate the SELECT statement without the CTE prologue.
    fn to_select_sql(&self) -> String {
        let mut sql = String::from("SELECT ");

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        let mut where_clauses: Vec<String> = Vec::new();
        let mut order_by: Vec<String> = Vec::new();
        let mut limit: Option<usize> = None;
        let mut offset: Option<usize> = None;

        for cage in &self.cages {
            match cage.kind {
                CageKind::Filter => {
                    where_clauses.extend(cage.conditions.iter().map(|c| c.to_sql()));
                }
                CageKind::Sort(order) => {
                    if let Some(cond) = cage.conditions.first() {
                        let dir = match order {
                            SortOrder::Asc => "ASC",
                            SortOrder::Desc => "DESC",
                        };
                        order_by.push(format!("{} {}", cond.column, dir));
                    }
                }
                // Last one wins
                CageKind::Limit(n) => limit = Some(n),
                CageKind::Offset(n) => offset = Some(n),
            }
        }

        if !where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clauses.join(" AND "));
        }

        if !order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by.join(", "));
        }

        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }

        sql
    }
}

impl Condition {
    fn to_sql(&self) -> String {
        match self.op {
            Operator::Eq => format!("{} = {}", self.column, self.value),
            Operator::Ne => format!("{} != {}", self.column, self.value),
            Operator::Gt => format!("{} > {}", self.column, self.value),
            Operator::Gte => format!("{} >= {}", self.column, self.value),
            Operator::Lt => format!("{} < {}", self.column, self.value),
            Operator::Lte => format!("{} <= {}", self.column, self.value),
            Operator::Fuzzy => {
                let val = match &self.value {
                    Value::String(s) => format!("'%{}%'", s.replace('\'', "''")),
                    Value::Param(n) => format!("'%' || ${} || '%'", n),
                    v => format!("'%{}%'", v),
                };
                format!("{} ILIKE {}", self.column, val)
            }
            Operator::IsNull => format!("{} IS NULL", self.column),
            Operator::IsNotNull => format!("{} IS NOT NULL", self.column),
        }
    }
}
