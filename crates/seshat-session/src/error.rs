//! Error types for the session crate.

use thiserror::Error;

/// Errors surfaced to the host by session operations.
///
/// Loads never fail with these: a missing, corrupt, or unreachable record
/// reads as "no session". Saves do fail loudly — silently dropping a write
/// is unacceptable.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session could not be converted to or from its stored form.
    #[error("Conversion error: {0}")]
    Conversion(#[from] seshat_store::ConversionError),

    /// The record store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] seshat_store::StoreError),

    /// The stack was assembled incorrectly.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
