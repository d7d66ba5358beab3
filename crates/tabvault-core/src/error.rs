//! Error types for Tabvault operations
//!
//! Every fallible operation in the workspace returns a `TabError`. Variants
//! carry enough context (column, offset, sizes) to report the failure
//! without the caller re-deriving it.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::types::DataType;

/// Tabvault error types with detailed context
#[derive(Debug, Clone)]
pub enum TabError {
    /// Table definition rejected at creation or rename
    InvalidSchema {
        /// Why the schema was rejected
        reason: String,
    },

    /// Row value count does not match the attribute count
    ArityMismatch {
        /// Number of attributes in the table
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// A value's runtime type does not match its column type
    TypeMismatch {
        /// Column receiving the value
        column: String,
        /// Declared column type
        expected: DataType,
        /// Type of the supplied value
        found: DataType,
    },

    /// No column with this name exists in the table
    ColumnNotFound {
        table: String,
        column: String,
    },

    /// No table with this name exists (catalog or data directory)
    TableNotFound {
        name: String,
    },

    /// A column or table with this name already exists
    DuplicateName {
        /// What kind of object collided ("column" or "table")
        kind: &'static str,
        name: String,
    },

    /// Numeric literal could not be parsed under the strict policy
    InvalidLiteral {
        literal: String,
        expected: DataType,
    },

    /// Comparison operator is not one of `= != > < >= <=`
    UnknownOperator {
        operator: String,
    },

    /// Input ended before a field was complete
    Truncated {
        /// Field being decoded
        field: &'static str,
        /// Byte offset where the field starts
        offset: u64,
        /// Bytes the field needs
        needed: u64,
        /// Bytes actually left
        available: u64,
    },

    /// Input is complete but structurally invalid
    Malformed {
        /// Byte offset of the bad field
        offset: u64,
        /// Description of the problem
        reason: String,
    },

    /// Peer sent a frame that does not follow the transfer protocol
    Protocol {
        reason: String,
    },

    /// Server answered with an `ERROR:` line
    Remote {
        message: String,
    },

    /// Catalog is full
    CatalogFull {
        limit: usize,
    },

    /// Server closed the connection without answering: every slot was taken
    PoolExhausted {
        addr: String,
    },

    /// Row storage could not grow; the table is unchanged
    CapacityExhausted {
        /// Rows the table tried to make room for
        requested: usize,
    },

    /// I/O operation failed
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },
}

impl TabError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io_at(path: impl Into<PathBuf>, err: std::io::Error, context: &str) -> Self {
        TabError::Io {
            path: Some(path.into()),
            kind: err.kind(),
            message: format!("{}: {}", context, err),
        }
    }

    /// Shorthand for a protocol violation.
    pub fn protocol(reason: impl Into<String>) -> Self {
        TabError::Protocol { reason: reason.into() }
    }
}

impl fmt::Display for TabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabError::InvalidSchema { reason } => write!(f, "Invalid schema: {}", reason),

            TabError::ArityMismatch { expected, actual } => {
                write!(f, "Arity mismatch: table has {} attributes, row has {} values", expected, actual)
            }

            TabError::TypeMismatch { column, expected, found } => {
                write!(f, "Type mismatch in column '{}': expected {}, found {}", column, expected, found)
            }

            TabError::ColumnNotFound { table, column } => {
                write!(f, "Column '{}' not found in table '{}'", column, table)
            }

            TabError::TableNotFound { name } => write!(f, "Table '{}' not found", name),

            TabError::DuplicateName { kind, name } => {
                write!(f, "Duplicate {} name '{}'", kind, name)
            }

            TabError::InvalidLiteral { literal, expected } => {
                write!(f, "Literal '{}' is not a valid {}", literal, expected)
            }

            TabError::UnknownOperator { operator } => {
                write!(f, "Unknown operator '{}' (expected one of = != > < >= <=)", operator)
            }

            TabError::Truncated { field, offset, needed, available } => {
                write!(f, "Truncated {} at offset {}: need {} bytes, only {} available",
                       field, offset, needed, available)
            }

            TabError::Malformed { offset, reason } => {
                write!(f, "Malformed table data at offset {}: {}", offset, reason)
            }

            TabError::Protocol { reason } => write!(f, "Protocol error: {}", reason),

            TabError::Remote { message } => write!(f, "Server error: {}", message),

            TabError::CatalogFull { limit } => {
                write!(f, "Catalog full: at most {} tables may be held in memory", limit)
            }

            TabError::PoolExhausted { addr } => {
                write!(f, "Server {} closed the connection without a response (connection pool exhausted)", addr)
            }

            TabError::CapacityExhausted { requested } => {
                write!(f, "Row storage exhausted: could not reserve room for {} rows", requested)
            }

            TabError::Io { path, kind, message } => {
                if let Some(path) = path {
                    write!(f, "I/O error in {}: {} ({})", path.display(), message, kind)
                } else {
                    write!(f, "I/O error: {} ({})", message, kind)
                }
            }
        }
    }
}

impl Error for TabError {}

/// Convert std::io::Error to TabError::Io
impl From<std::io::Error> for TabError {
    fn from(err: std::io::Error) -> Self {
        TabError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for Tabvault operations
pub type TabResult<T> = Result<T, TabError>;
