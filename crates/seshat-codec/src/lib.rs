//! Chunked binary payload codec.
//!
//! Table items have a hard size limit, session payloads do not. This crate
//! encodes an arbitrary byte payload into one or more item-sized chunks and
//! reassembles them:
//!
//! - Payloads at or above a configurable threshold are gzip-compressed.
//! - An 8-byte header (big-endian `u32` decompressed length, big-endian
//!   `u32` compressed length) sits at the front of chunk 1.
//! - The header+payload stream is split into chunks sized to fit a table
//!   item after per-item attribute overhead.
//!
//! Decoding is incremental: callers feed chunks to a [`ChunkAssembler`] in
//! sequence order and fetch more only when it asks, so a reader never has to
//! know the chunk count up front.

mod chunk;
mod compress;
mod error;

pub use chunk::{
    Assembly, ChunkAssembler, ChunkCodec, CodecConfig, PayloadHeader, decode_all,
    DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_MAX_ITEM_SIZE, LENGTH_HEADER_BYTES, MAX_PAYLOAD_BYTES,
};
pub use error::{CodecError, Result};
