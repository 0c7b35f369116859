//! Common error types for unidb

use thiserror::Error;

/// Common result type for unidb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types raised by the document store and the bootstrap steps
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or imported document is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raw CSV extract could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Explicit collection creation hit an existing collection
    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    /// Operation requires a collection that does not exist
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Document rejected by the collection validator
    #[error("Document failed validation for '{collection}': {}", .reasons.join("; "))]
    DocumentValidation {
        collection: String,
        reasons: Vec<String>,
    },

    /// Index name or key pattern clashes with an existing index
    #[error("Index conflict on '{collection}': {message}")]
    IndexConflict { collection: String, message: String },

    /// Invalid identifier, path or input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
