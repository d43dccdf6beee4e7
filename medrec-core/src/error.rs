/// Structured error types for medrec-core.
///
/// Uses `thiserror` for better API surface and error composition.
/// The CLI binary uses `anyhow` for convenience, but library consumers
/// get structured, composable errors.
///
/// Every failure class here is contained at the narrowest possible scope
/// (per-line, per-source, or per-table) by the callers; the only error
/// that reaches the end of a request is [`MedrecError::NoIdentity`].

use std::io;
use thiserror::Error;

/// Main error type for medrec-core operations
#[derive(Error, Debug)]
pub enum MedrecError {
    /// Neither a patient identifier nor a full name was supplied
    #[error("no patient identifier or full name provided")]
    NoIdentity,

    /// A source's connection parameters or schema mapping are unusable
    #[error("invalid configuration for source '{source_name}': {reason}")]
    Config { source_name: String, reason: String },

    /// Pool exhausted or source unreachable
    #[error("connection failure on '{source_name}': {reason}")]
    Connection { source_name: String, reason: String },

    /// A query against one table failed at execution time
    #[error("query failed on '{source_name}': {reason}")]
    Query { source_name: String, reason: String },

    /// A registry line did not parse as an MPI record
    #[error("malformed registry line {line}: {reason}")]
    Registry { line: usize, reason: String },

    /// A table or column name failed the identifier allow-list
    #[error("unsafe identifier '{0}' rejected")]
    UnsafeIdentifier(String),

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Result type alias for medrec-core operations
pub type Result<T> = std::result::Result<T, MedrecError>;

impl MedrecError {
    /// Create a config error for a source
    pub fn config(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection error for a source
    pub fn connection(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connection {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a query error for a source
    pub fn query(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Query {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a registry parse error
    pub fn registry(line: usize, reason: impl ToString) -> Self {
        Self::Registry {
            line,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MedrecError::config("hospA", "missing schema mapping");
        assert_eq!(
            err.to_string(),
            "invalid configuration for source 'hospA': missing schema mapping"
        );

        let err = MedrecError::registry(7, "expected value at line 1 column 3");
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: MedrecError = io_err.into();

        assert!(matches!(err, MedrecError::Io { .. }));
    }
}
