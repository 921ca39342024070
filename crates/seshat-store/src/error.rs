//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur in record store and reaper operations.
///
/// "No record for this id" is not an error; see
/// [`GetOutcome`](crate::GetOutcome).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error from the table boundary.
    #[error("Table error: {0}")]
    Table(#[from] seshat_table::TableError),

    /// Error encoding a payload for storage.
    #[error("Codec error: {0}")]
    Codec(#[from] seshat_codec::CodecError),
}

impl StoreError {
    /// Whether retrying the operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Table(e) if e.is_transient())
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
