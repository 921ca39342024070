//! Error types for the codec crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding chunked payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Header lengths are nonsensical, the stream is malformed, or
    /// decompression failed.
    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),

    /// Fewer chunk bytes were provided than the header declares.
    #[error("Incomplete payload: have {have} of {need} bytes, next sequence {next_seq}")]
    Incomplete {
        /// Bytes collected so far.
        have: usize,
        /// Bytes the header says are required.
        need: usize,
        /// The sequence number the caller should fetch next.
        next_seq: u32,
    },

    /// The payload exceeds what the length header can describe.
    #[error("Payload too large: {size} bytes exceeds limit of {max}")]
    TooLarge { size: usize, max: usize },

    /// The configured item size leaves no room for payload bytes.
    #[error("Invalid codec configuration: {0}")]
    InvalidConfig(String),

    /// Compression failed while encoding.
    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
