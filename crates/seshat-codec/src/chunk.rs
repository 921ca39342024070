//! Chunk encoding and incremental reassembly.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::compress;
use crate::error::{CodecError, Result};

/// Size of the length header at the front of chunk 1: two big-endian `u32`
/// values, decompressed length then compressed length.
pub const LENGTH_HEADER_BYTES: usize = 8;

/// Sanity cap on declared payload lengths. A header above this is corrupt,
/// not a request to allocate.
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Default hard per-item size limit of the backing table.
pub const DEFAULT_MAX_ITEM_SIZE: usize = 400 * 1024;

/// Default payload size at which compression kicks in.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 8 * 1024;

/// Fixed per-item attribute overhead reserved out of the item size limit:
/// attribute names, record metadata on chunk 1, and storage framing.
const ITEM_ATTRIBUTE_OVERHEAD: usize = 160;

/// The sequence number is stored as decimal text; `u32::MAX` has ten digits.
const MAX_SEQUENCE_DIGITS: usize = 10;

/// Configuration for [`ChunkCodec`].
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Hard size limit of one table item, in bytes.
    pub max_item_size: usize,

    /// Payloads at or above this size are gzip-compressed before chunking.
    pub compression_threshold: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
        }
    }
}

impl CodecConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-item size limit.
    pub fn with_max_item_size(mut self, max_item_size: usize) -> Self {
        self.max_item_size = max_item_size;
        self
    }

    /// Set the compression threshold.
    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }
}

/// The two length fields read from the front of chunk 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Length of the payload after decompression.
    pub decompressed_len: u32,

    /// Length of the stored byte stream (compressed, or raw if equal to
    /// `decompressed_len`).
    pub compressed_len: u32,
}

impl PayloadHeader {
    fn parse(buf: &[u8]) -> Result<Self> {
        let decompressed_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let compressed_len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);

        if decompressed_len as usize > MAX_PAYLOAD_BYTES
            || compressed_len as usize > MAX_PAYLOAD_BYTES
        {
            return Err(CodecError::CorruptPayload(format!(
                "header lengths {decompressed_len}/{compressed_len} exceed sane maximum"
            )));
        }
        if compressed_len == 0 && decompressed_len != 0 {
            return Err(CodecError::CorruptPayload(
                "header declares empty stream for a non-empty payload".to_string(),
            ));
        }

        Ok(Self {
            decompressed_len,
            compressed_len,
        })
    }

    /// Whether the stored stream is compressed.
    pub fn is_compressed(&self) -> bool {
        self.decompressed_len != self.compressed_len
    }

    /// Total bytes the full stream occupies, header included.
    pub fn total_len(&self) -> usize {
        LENGTH_HEADER_BYTES + self.compressed_len as usize
    }
}

/// Splits payloads into table-item-sized chunks and back.
#[derive(Debug, Clone, Default)]
pub struct ChunkCodec {
    config: CodecConfig,
}

impl ChunkCodec {
    /// Create a codec with the given configuration.
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// The codec configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Usable payload bytes per chunk for a given session id.
    ///
    /// The id is stored on every item and the sequence number as decimal
    /// text, so both come out of the per-item budget.
    pub fn chunk_capacity(&self, id: &str) -> usize {
        self.config
            .max_item_size
            .saturating_sub(id.len() + MAX_SEQUENCE_DIGITS + ITEM_ATTRIBUTE_OVERHEAD)
    }

    /// Encode a raw payload into ordered chunks.
    ///
    /// Produces at least one chunk even for an empty payload (the header-only
    /// chunk with both lengths zero).
    pub fn encode(&self, id: &str, raw: &[u8]) -> Result<Vec<Bytes>> {
        if raw.len() > MAX_PAYLOAD_BYTES {
            return Err(CodecError::TooLarge {
                size: raw.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }

        let capacity = self.chunk_capacity(id);
        if capacity < LENGTH_HEADER_BYTES {
            return Err(CodecError::InvalidConfig(format!(
                "max_item_size {} leaves no room for payload bytes after item overhead",
                self.config.max_item_size
            )));
        }

        let body = if raw.len() >= self.config.compression_threshold {
            compress::compress(raw)?
        } else {
            raw.to_vec()
        };
        if body.len() > MAX_PAYLOAD_BYTES {
            return Err(CodecError::TooLarge {
                size: body.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }

        let mut stream = BytesMut::with_capacity(LENGTH_HEADER_BYTES + body.len());
        stream.put_u32(raw.len() as u32);
        stream.put_u32(body.len() as u32);
        stream.extend_from_slice(&body);
        let mut stream = stream.freeze();

        let mut chunks = Vec::with_capacity(stream.len().div_ceil(capacity));
        while !stream.is_empty() {
            let take = capacity.min(stream.len());
            chunks.push(stream.split_to(take));
        }

        debug!(
            session_id = %id,
            raw_len = raw.len(),
            stored_len = body.len(),
            chunks = chunks.len(),
            "Encoded session payload"
        );
        Ok(chunks)
    }
}

/// Outcome of feeding one chunk to a [`ChunkAssembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// The declared length is not yet covered; fetch this sequence next.
    NeedMore { next_seq: u32 },

    /// The payload is fully reassembled (and decompressed).
    Complete(Vec<u8>),
}

/// Incremental chunk reassembly.
///
/// Feed chunks in ascending sequence order starting at 1. The assembler
/// reads the length header from the front of the first chunk and keeps
/// asking for the next sequence until the declared byte count is covered.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    buf: BytesMut,
    header: Option<PayloadHeader>,
    chunks_seen: u32,
}

impl ChunkAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed header, once chunk 1 has been pushed.
    pub fn header(&self) -> Option<PayloadHeader> {
        self.header
    }

    /// Bytes collected so far, header included.
    pub fn collected_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Feed the next chunk in sequence order.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Assembly> {
        self.chunks_seen += 1;
        self.buf.extend_from_slice(chunk);
        trace!(
            seq = self.chunks_seen,
            chunk_len = chunk.len(),
            collected = self.buf.len(),
            "Chunk received"
        );

        let header = match self.header {
            Some(header) => header,
            None => {
                if self.buf.len() < LENGTH_HEADER_BYTES {
                    return Err(CodecError::CorruptPayload(format!(
                        "first chunk holds {} bytes, shorter than the {LENGTH_HEADER_BYTES}-byte length header",
                        self.buf.len()
                    )));
                }
                let header = PayloadHeader::parse(&self.buf)?;
                self.header = Some(header);
                header
            }
        };

        let need = header.total_len();
        if self.buf.len() < need {
            return Ok(Assembly::NeedMore {
                next_seq: self.chunks_seen + 1,
            });
        }
        if self.buf.len() > need {
            return Err(CodecError::CorruptPayload(format!(
                "{} bytes past the declared stream length",
                self.buf.len() - need
            )));
        }

        let body = &self.buf[LENGTH_HEADER_BYTES..];
        let raw = if header.is_compressed() {
            compress::decompress(body, header.decompressed_len as usize)?
        } else {
            body.to_vec()
        };
        Ok(Assembly::Complete(raw))
    }

    /// The total byte count the header declares, once known.
    pub fn needed_bytes(&self) -> Option<usize> {
        self.header.map(|h| h.total_len())
    }
}

/// Decode a payload from chunks that are already all in hand.
///
/// Convenience over [`ChunkAssembler`] for migration tooling and tests;
/// running out of chunks before the declared length is covered yields
/// [`CodecError::Incomplete`].
pub fn decode_all<'a, I>(chunks: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut assembler = ChunkAssembler::new();
    let mut next_seq = 1;
    for chunk in chunks {
        match assembler.push(chunk)? {
            Assembly::Complete(raw) => return Ok(raw),
            Assembly::NeedMore { next_seq: seq } => next_seq = seq,
        }
    }
    Err(CodecError::Incomplete {
        have: assembler.collected_bytes(),
        need: assembler.needed_bytes().unwrap_or(LENGTH_HEADER_BYTES),
        next_seq,
    })
}
