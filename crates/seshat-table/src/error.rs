//! Error types for the table crate.

use thiserror::Error;

/// Errors that can occur at the table boundary.
#[derive(Debug, Error)]
pub enum TableError {
    /// Transient failure talking to the table; safe to retry.
    #[error("Table unavailable: {0}")]
    Unavailable(String),

    /// An item came back without the attributes the schema requires.
    #[error("Malformed item: {0}")]
    MalformedItem(String),

    /// A scan continuation token could not be interpreted.
    #[error("Invalid scan cursor: {0}")]
    InvalidCursor(String),

    /// SQLite backend error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl TableError {
    /// Whether retrying the operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TableError::Unavailable(_))
    }
}

/// Result type alias for table operations.
pub type Result<T> = std::result::Result<T, TableError>;
