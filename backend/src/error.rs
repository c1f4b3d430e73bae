//! Error types for the CSV upsert service.
//!
//! Errors are layered the same way the import flows through the crate:
//!
//! - [`CsvError`] - decoding the uploaded bytes into rows
//! - [`StoreError`] - the persistence gateway (SQLite)
//! - [`ImportError`] - whole-import failures (wraps the two above)
//! - [`ServerError`] - HTTP-facing errors, rendered as `{"message": ...}`
//!
//! Per-row problems (validation, number parsing) are *not* errors here: they
//! are carried as values in the import report so one bad row never aborts a
//! batch. Only the variants below stop an import.

use thiserror::Error;

// =============================================================================
// CSV Decoding Errors
// =============================================================================

/// Errors that reject a whole upload before any row is processed.
#[derive(Debug, Error)]
pub enum CsvError {
    /// The upload contained zero bytes.
    #[error("File is empty")]
    EmptyFile,

    /// The header row could not be read.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// A column the entity type cannot do without is absent from the header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The underlying CSV reader failed outside of a data row.
    #[error("Invalid CSV format: {0}")]
    Parse(String),
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        CsvError::Parse(err.to_string())
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the persistence gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write (e.g. a concurrent import inserted
    /// the same natural key first).
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The shared connection mutex was poisoned by a panicking writer.
    #[error("Database connection is unavailable: {0}")]
    Unavailable(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::UniqueViolation(msg.unwrap_or_else(|| code.to_string()))
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

// =============================================================================
// Import Errors (whole operation)
// =============================================================================

/// Failures that abort an import as a unit. Nothing is persisted when one of
/// these is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The upload could not be decoded.
    #[error(transparent)]
    Csv(#[from] CsvError),

    /// Snapshot lookup or commit failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP-facing errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid request (missing file, wrong extension, unreadable multipart).
    #[error("{0}")]
    BadRequest(String),

    /// Upload exceeded the configured body limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Server internal error.
    #[error("{0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV decoding.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for HTTP handlers.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let import_err: ImportError = CsvError::MissingColumn("Email".into()).into();
        assert_eq!(import_err.to_string(), "Missing required column: Email");

        let import_err: ImportError = StoreError::Database("disk I/O error".into()).into();
        assert!(import_err.to_string().contains("disk I/O error"));
    }

    #[test]
    fn test_unique_violation_is_recognised() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT NOT NULL UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();

        match StoreError::from(err) {
            StoreError::UniqueViolation(msg) => assert!(msg.contains("UNIQUE")),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_message() {
        assert_eq!(CsvError::EmptyFile.to_string(), "File is empty");
    }
}
