//! # QAIL CTE — composable WITH clauses
//!
//! Named Common Table Expressions for the QAIL query builder, including
//! `WITH RECURSIVE`.
//!
//! ## Quick Example
//!
//! ```rust
//! use qail_cte::prelude::*;
//!
//! let cmd = QailCmd::get("popular_posts")
//!     .with("popular_posts AS (SELECT * FROM posts WHERE views_count > 100)")?
//!     .with(WithArg::map([("authors", "SELECT id, name FROM users")]))?
//!     .hook(&["id", "title"]);
//!
//! assert_eq!(
//!     cmd.to_sql(),
//!     "WITH popular_posts AS (SELECT * FROM posts WHERE views_count > 100), \
//!      authors AS (SELECT id, name FROM users) \
//!      SELECT id, title FROM popular_posts"
//! );
//! # Ok::<(), CteError>(())
//! ```
//!
//! ## Accepted `.with()` arguments
//!
//! | Argument            | Example                                       |
//! |---------------------|-----------------------------------------------|
//! | CTE string          | `"recent AS (SELECT ...)"`                    |
//! | Name to body map    | `WithArg::map([("recent", sub_query)])`       |
//! | Pre-built node      | `CteDefinition::sql("recent", "SELECT ...")`  |
//! | List of nodes       | `vec![node_a, node_b]`                        |

pub mod ast;
pub mod config;
pub mod error;
pub mod parser;
pub mod registry;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::CteConfig;
    pub use crate::error::*;
    pub use crate::parser::{parse_cte, ParsedCte};
    pub use crate::registry::{CteBody, CteDefinition, CteRegistry, WithArg, WithValue};
    pub use crate::transpiler::ToSql;
}

/// Parse a `table_name AS (SELECT ...)` string.
///
/// # Example
///
/// ```
/// use qail_cte::parse;
///
/// let cte = parse("`quoted_table` AS (SELECT * FROM posts)").unwrap();
/// assert_eq!(cte.table_name, "quoted_table");
/// ```
pub fn parse(input: &str) -> Result<parser::ParsedCte, error::CteError> {
    parser::parse_cte(input)
}
