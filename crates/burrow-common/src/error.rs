//! Error types for BurrowDB.

use thiserror::Error;

/// Result type alias using BurrowError.
pub type Result<T> = std::result::Result<T, BurrowError>;

/// Errors that can occur in BurrowDB operations.
///
/// Variants fall into two groups. Contract violations (`PoolExhausted`,
/// `DuplicateKey`, `TypeMismatch`, `CorruptNode`) indicate a broken invariant
/// and are not expected to be retried. Lookup misses (`TableNotFound`,
/// cursor end-of-table) are ordinary control flow and surface as `Option` or
/// dedicated variants the caller is expected to handle.
#[derive(Debug, Error)]
pub enum BurrowError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Page store errors
    #[error("page {page_no} out of bounds for file {file_id}")]
    PageOutOfBounds { file_id: u32, page_no: u32 },

    // Buffer pool errors
    #[error("buffer pool exhausted: every cached page is pinned")]
    PoolExhausted,

    // Node codec errors
    #[error("invalid node kind tag: {0}")]
    InvalidNodeKind(u8),

    #[error("node corrupted on page {page_no}: {reason}")]
    CorruptNode { page_no: u32, reason: String },

    #[error("node full, cannot fit {size} bytes")]
    NodeFull { size: usize },

    // Tree / record errors
    #[error("duplicate key")]
    DuplicateKey,

    #[error("record of {size} bytes cannot fit in a leaf (max {max})")]
    RecordTooLarge { size: usize, max: usize },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    // Type errors
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    // Schema / catalog errors
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("schema of {size} bytes does not fit in the meta node (max {max})")]
    SchemaTooLarge { size: usize, max: usize },

    #[error("schema error: {0}")]
    SchemaError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: BurrowError = io_err.into();
        assert!(matches!(err, BurrowError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_page_out_of_bounds_display() {
        let err = BurrowError::PageOutOfBounds {
            file_id: 3,
            page_no: 42,
        };
        assert_eq!(err.to_string(), "page 42 out of bounds for file 3");
    }

    #[test]
    fn test_pool_exhausted_display() {
        let err = BurrowError::PoolExhausted;
        assert_eq!(
            err.to_string(),
            "buffer pool exhausted: every cached page is pinned"
        );
    }

    #[test]
    fn test_node_errors_display() {
        let err = BurrowError::InvalidNodeKind(9);
        assert_eq!(err.to_string(), "invalid node kind tag: 9");

        let err = BurrowError::CorruptNode {
            page_no: 7,
            reason: "dangling overflow pointer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "node corrupted on page 7: dangling overflow pointer"
        );

        let err = BurrowError::NodeFull { size: 100 };
        assert_eq!(err.to_string(), "node full, cannot fit 100 bytes");
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = BurrowError::TypeMismatch {
            expected: "INTEGER".to_string(),
            actual: "TEXT".to_string(),
        };
        assert_eq!(err.to_string(), "type mismatch: expected INTEGER, got TEXT");
    }

    #[test]
    fn test_catalog_errors_display() {
        let err = BurrowError::TableNotFound("users".to_string());
        assert_eq!(err.to_string(), "table not found: users");

        let err = BurrowError::TableAlreadyExists("orders".to_string());
        assert_eq!(err.to_string(), "table already exists: orders");

        let err = BurrowError::ColumnNotFound("email".to_string());
        assert_eq!(err.to_string(), "column not found: email");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(BurrowError::DuplicateKey)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BurrowError>();
    }
}
