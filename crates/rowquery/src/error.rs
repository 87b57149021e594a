//! Error types for rowquery

use thiserror::Error;

/// Result type alias for rowquery operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while building restrictions, queries and join graphs, or while
/// compiling them to SQL.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Argument validation failed while constructing a restriction, ordering or page window
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A table, column or collation name failed identifier validation
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A field name could not be resolved against the row type's columns
    #[error("Unknown field '{field}' on '{table}'")]
    UnknownField { table: String, field: String },

    /// Join graph error (unknown row type, alias collision, unreachable node)
    #[error("Join graph error: {0}")]
    Graph(String),

    /// The requested statement is not available for this row type
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Error reported by the database driver while reading a fetched row
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),
}

impl QueryError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a join graph error
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an unknown field error
    pub fn unknown_field(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Check if this is a construction (argument validation) error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if this is a join graph error
    pub fn is_graph_error(&self) -> bool {
        matches!(self, Self::Graph(_))
    }

    /// Check if this is an unknown field error
    pub fn is_unknown_field(&self) -> bool {
        matches!(self, Self::UnknownField { .. })
    }
}
