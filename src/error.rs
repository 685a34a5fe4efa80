//! Error types for QAIL CTE handling.

use thiserror::Error;

/// The main error type for CTE parsing and registry operations.
#[derive(Debug, Error)]
pub enum CteError {
    /// The CTE string was empty or whitespace only.
    #[error("CTE string cannot be empty")]
    EmptyInput,

    /// No standalone `AS` keyword in the CTE string.
    #[error("CTE string must contain 'AS' keyword. Expected 'table_name AS (SELECT ...)' but got: {0}")]
    MissingAs(String),

    /// No opening or no closing parenthesis in the CTE string.
    #[error("CTE expression must be enclosed in parentheses. Expected 'table_name AS (SELECT ...)' but got: {0}")]
    MissingParentheses(String),

    /// Parenthesis depth went negative or did not return to zero.
    #[error("Unbalanced parentheses in CTE expression: {0}")]
    UnbalancedParentheses(String),

    #[error("Empty table name in CTE string")]
    EmptyTableName,

    #[error("Empty expression in CTE string")]
    EmptyExpression,

    /// Anything else that does not fit `table_name AS (SELECT ...)`.
    #[error("Invalid CTE string format. Expected 'table_name AS (SELECT ...)' but got: {0}")]
    InvalidFormat(String),

    /// `.with()` was called without anything to attach.
    #[error("The method .with() must contain arguments.")]
    NoArguments,

    /// A name-to-body mapping was nested inside a list of CTEs.
    #[error("Unsupported argument type: a mapping of CTEs cannot be nested inside a list, pass it directly to .with()")]
    NestedMapping,

    /// A list was nested inside a list of CTEs.
    #[error("Unsupported argument type: nested lists of CTEs are not supported")]
    NestedList,

    /// A CTE body was null.
    #[error("Expression for CTE '{0}' must not be nil")]
    NilBody(String),

    /// A CTE body was a collection instead of a single query.
    #[error("Unsupported argument type for CTE '{0}': expected a single query or SQL string, got a collection")]
    CollectionBody(String),

    /// A mapping key was empty.
    #[error("CTE name must not be empty")]
    EmptyName,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML decoding error.
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CteError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error came from parsing a CTE string, as opposed to
    /// the shape of a `.with()` call or the environment.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput
                | Self::MissingAs(_)
                | Self::MissingParentheses(_)
                | Self::UnbalancedParentheses(_)
                | Self::EmptyTableName
                | Self::EmptyExpression
                | Self::InvalidFormat(_)
        )
    }
}

/// Result type alias for CTE operations.
pub type CteResult<T> = Result<T, CteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CteError::MissingAs("users (SELECT 1)".to_string());
        assert_eq!(
            err.to_string(),
            "CTE string must contain 'AS' keyword. Expected 'table_name AS (SELECT ...)' but got: users (SELECT 1)"
        );
    }

    #[test]
    fn test_usage_errors_are_not_parse_errors() {
        assert!(CteError::EmptyTableName.is_parse_error());
        assert!(!CteError::NoArguments.is_parse_error());
        assert!(!CteError::NilBody("x".into()).is_parse_error());
    }
}
