//! String CTE parser using nom.
//!
//! Turns a single free-form CTE string into a table name and an opaque
//! SQL expression.
//!
//! # Syntax Overview
//!
//! ```text
//!   popular_posts   AS   ( SELECT * FROM posts WHERE views_count > 100 )
//!   ──────┬──────   ─┬   ─────────────────────┬──────────────────────────
//!         │          │                        │
//!         │          │                        └── Expression (outermost parens)
//!         │          └── AS keyword (any case)
//!         └── Table name (bare, `backticked` or "double quoted")
//! ```
//!
//! Only the table name is understood. Everything between the first `(`
//! after `AS` and the final `)` of the string is kept verbatim, so nested
//! subqueries, multi-line SQL and array literals such as
//! `ARRAY[[1]]::bigint[]` pass through untouched.

use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while},
    character::complete::{char, multispace1, satisfy},
    combinator::{recognize, value},
    sequence::{delimited, pair, terminated},
    IResult,
};
use serde::Serialize;

use crate::error::{CteError, CteResult};
use crate::registry::CteDefinition;

/// A CTE string split into its name and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCte {
    /// Table name with any quoting removed. Never empty.
    pub table_name: String,
    /// SQL between the outermost parentheses, trimmed. Never empty.
    pub expression: String,
}

impl ParsedCte {
    /// Wrap the parsed pair as a raw-SQL CTE definition.
    pub fn into_definition(self) -> CteDefinition {
        CteDefinition::sql(self.table_name, self.expression)
    }
}

impl FromStr for ParsedCte {
    type Err = CteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cte(s)
    }
}

/// Parse a complete CTE string of the form `table_name AS (SELECT ...)`.
///
/// # Example
///
/// ```
/// use qail_cte::parser::parse_cte;
///
/// let cte = parse_cte("popular_posts AS (SELECT * FROM posts)").unwrap();
/// assert_eq!(cte.table_name, "popular_posts");
/// assert_eq!(cte.expression, "SELECT * FROM posts");
/// ```
pub fn parse_cte(input: &str) -> CteResult<ParsedCte> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CteError::EmptyInput);
    }

    let (body, table_name) = match parse_cte_head(trimmed) {
        Ok(parsed) => parsed,
        Err(_) => return Err(classify_failure(input)),
    };

    let table_name = table_name.trim();
    if table_name.is_empty() {
        return Err(CteError::EmptyTableName);
    }

    // With no ')' at all the outer parenthesis was never closed and the
    // balance check reports it. Text after a ')' is not a CTE string.
    let (expression, closed) = match body.strip_suffix(')') {
        Some(inner) => (inner, true),
        None if !body.contains(')') => (body, false),
        None => return Err(classify_failure(input)),
    };
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(CteError::EmptyExpression);
    }

    check_balanced(expression, closed)?;

    tracing::debug!("Parsed CTE string: table '{}'", table_name);

    Ok(ParsedCte {
        table_name: table_name.to_string(),
        expression: expression.to_string(),
    })
}

/// Parse everything up to and including the opening parenthesis.
/// Returns the remaining body and the (possibly empty) table name.
fn parse_cte_head(input: &str) -> IResult<&str, &str> {
    let (input, name) = alt((named_head, anonymous_head))(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = char('(')(input)?;
    Ok((input, name))
}

/// `table_name AS`
fn named_head(input: &str) -> IResult<&str, &str> {
    terminated(parse_table_name, pair(multispace1, parse_as_keyword))(input)
}

/// `AS` with the table name left out. Matched so the caller can report an
/// empty table name instead of a generic format error.
fn anonymous_head(input: &str) -> IResult<&str, &str> {
    value("", parse_as_keyword)(input)
}

fn parse_as_keyword(input: &str) -> IResult<&str, &str> {
    tag_no_case("as")(input)
}

/// Parse a table name in any of its three spellings.
fn parse_table_name(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('`'), take_while(|c: char| c != '`'), char('`')),
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        parse_identifier,
    ))(input)
}

/// Parse an unquoted identifier: a letter or underscore, then word characters.
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// Pick the most helpful error for input that did not match the grammar.
fn classify_failure(original: &str) -> CteError {
    if original.trim().is_empty() {
        return CteError::EmptyInput;
    }

    let has_as = original
        .split_whitespace()
        .any(|word| word.eq_ignore_ascii_case("as"));
    if !has_as {
        return CteError::MissingAs(original.to_string());
    }

    if !original.contains('(') || !original.contains(')') {
        return CteError::MissingParentheses(original.to_string());
    }

    CteError::InvalidFormat(original.to_string())
}

fn check_balanced(expression: &str, closed: bool) -> CteResult<()> {
    let mut depth: usize = 0;
    for c in expression.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| CteError::UnbalancedParentheses(expression.to_string()))?;
            }
            _ => {}
        }
    }

    if depth != 0 || !closed {
        return Err(CteError::UnbalancedParentheses(expression.to_string()));
    }
    Ok(())
}
