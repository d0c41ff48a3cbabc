//! Error types for sqlcache.

use thiserror::Error;

/// The main error type for compilation, caching and execution.
#[derive(Debug, Error)]
pub enum SqlError {
    /// A visitor could not render a node for the target dialect.
    #[error("Render error: {0}")]
    Render(String),

    /// The connection rejected a prepare.
    #[error("Prepare failed for `{sql}`: {message}")]
    Prepare { sql: String, message: String },

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// One or more prepared statements failed to close.
    #[error("Failed to close {} prepared statement(s): {}", .0.len(), .0.join("; "))]
    Teardown(Vec<String>),

    /// A cached argument slot has no value in the current call.
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// A decoded column could not be written into its destination field.
    #[error("Scan error on column '{column}': {message}")]
    Scan { column: String, message: String },

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML configuration.
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqlError {
    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Create a prepare error for the given SQL text.
    pub fn prepare(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Prepare {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create a scan error for the given column.
    pub fn scan(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scan {
            column: column.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for sqlcache operations.
pub type SqlResult<T> = Result<T, SqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqlError::prepare("SELEC 1", "syntax error");
        assert_eq!(err.to_string(), "Prepare failed for `SELEC 1`: syntax error");
    }

    #[test]
    fn test_teardown_aggregates() {
        let err = SqlError::Teardown(vec!["s1: gone".into(), "s2: gone".into()]);
        assert_eq!(
            err.to_string(),
            "Failed to close 2 prepared statement(s): s1: gone; s2: gone"
        );
    }
}
