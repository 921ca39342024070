//! Physical table item types.

use bytes::Bytes;

/// Primary key of one physical item: session id plus chunk sequence number.
///
/// Sequence numbers start at 1. A single-chunk record is just `(id, 1)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    /// Session id (table hash key).
    pub id: String,

    /// Chunk sequence number (table range key), starting at 1.
    pub seq: u32,
}

impl ItemKey {
    /// Key for a given id and sequence number.
    pub fn new(id: impl Into<String>, seq: u32) -> Self {
        Self { id: id.into(), seq }
    }

    /// Key of the primary (metadata-carrying) chunk for an id.
    pub fn primary(id: impl Into<String>) -> Self {
        Self::new(id, 1)
    }
}

/// One physical table item.
///
/// Metadata attributes are only populated on the primary chunk (`seq == 1`);
/// trailing chunks carry the key and data slice alone.
#[derive(Debug, Clone, PartialEq)]
pub struct TableItem {
    /// Session id.
    pub id: String,

    /// Chunk sequence number.
    pub seq: u32,

    /// This chunk's slice of the encoded payload.
    pub data: Bytes,

    /// Creation time (epoch ms); primary chunk only.
    pub created_at: Option<i64>,

    /// Last update time (epoch ms); primary chunk only.
    pub last_updated_at: Option<i64>,

    /// Expiry index hash key (`YYYY-MM-DD`); primary chunk of expirable
    /// records only.
    pub expiry_partition: Option<String>,

    /// Expiry index range key (epoch ms); primary chunk of expirable
    /// records only.
    pub expiry_timestamp: Option<i64>,
}

impl TableItem {
    /// A bare data chunk with no metadata.
    pub fn chunk(id: impl Into<String>, seq: u32, data: Bytes) -> Self {
        Self {
            id: id.into(),
            seq,
            data,
            created_at: None,
            last_updated_at: None,
            expiry_partition: None,
            expiry_timestamp: None,
        }
    }

    /// This item's key.
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.id.clone(), self.seq)
    }

    /// Whether this is the metadata-carrying primary chunk.
    pub fn is_primary(&self) -> bool {
        self.seq == 1
    }
}

/// Opaque scan continuation token.
///
/// Produced by one scan page, passed back to fetch the next. Callers must
/// not interpret the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor(pub(crate) String);

impl ScanCursor {
    pub(crate) fn encode(id: &str, seq: u32) -> Self {
        Self(format!("{id}\u{0}{seq}"))
    }

    pub(crate) fn decode(&self) -> crate::Result<(String, u32)> {
        let (id, seq) = self
            .0
            .rsplit_once('\u{0}')
            .ok_or_else(|| crate::TableError::InvalidCursor("missing separator".to_string()))?;
        let seq = seq
            .parse()
            .map_err(|e| crate::TableError::InvalidCursor(format!("bad sequence: {e}")))?;
        Ok((id.to_string(), seq))
    }
}

/// One page of a table scan.
#[derive(Debug, Clone)]
pub struct ScanPage {
    /// Items in this page, in scan order.
    pub items: Vec<TableItem>,

    /// Continuation token; `None` when the scan is exhausted.
    pub cursor: Option<ScanCursor>,
}
