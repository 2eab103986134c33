//! Error types shared across the GeoScore workspace.
//!
//! Evaluation failures are deliberately *not* errors: a predicted query that
//! fails to execute is a measurement, recorded in the output record. The
//! variants here cover infrastructure faults only — I/O, malformed inputs,
//! and database-connection problems that prevent an evaluation from being
//! attempted at all.

use thiserror::Error;

/// Primary error type for GeoScore operations.
#[derive(Error, Debug)]
pub enum GeoscoreError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The database connection could not be established.
    #[error("failed to connect to database '{database}': {detail}")]
    Connect { database: String, detail: String },

    /// The database connection was lost mid-record.
    #[error("database connection lost: {detail}")]
    ConnectionLost { detail: String },

    /// A backend operation failed for a reason other than a lost connection.
    #[error("database error: {detail}")]
    Backend { detail: String },

    /// An input record is missing a required field.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// An input line could not be parsed as a JSON record.
    #[error("malformed record at line {line}: {detail}")]
    MalformedRecord { line: usize, detail: String },

    /// A row was captured with the wrong number of values.
    #[error("row has {actual} values but the result declares {expected} columns")]
    RowArity { expected: usize, actual: usize },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GeoscoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_stable() {
        let e = GeoscoreError::RowArity {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            e.to_string(),
            "row has 2 values but the result declares 3 columns"
        );

        let e = GeoscoreError::MissingField { field: "gold_sql" };
        assert_eq!(e.to_string(), "missing required field: gold_sql");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: GeoscoreError = io.into();
        assert!(matches!(e, GeoscoreError::Io(_)));
    }
}
