//! The stored session record.

use bytes::Bytes;
use chrono::DateTime;
use seshat_types::now_epoch_ms;

/// The logical stored representation of one session.
///
/// `payload` holds the decoded (reassembled, decompressed) session bytes;
/// the chunked on-wire form only exists inside the record store. A record
/// fully replaces any prior record with the same id on write.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// Primary key. Unique, immutable once created.
    pub id: String,

    /// Decoded session payload.
    pub payload: Bytes,

    /// Creation time (epoch ms). Set once, never refreshed.
    pub created_at: i64,

    /// Last save time (epoch ms). Refreshed on every save.
    pub last_updated_at: i64,

    /// Expiry index hash key (`YYYY-MM-DD`); `None` for immortal sessions.
    pub expiry_partition: Option<String>,

    /// Absolute expiry instant (epoch ms); `None` for immortal sessions.
    pub expiry_timestamp: Option<i64>,
}

impl SessionRecord {
    /// Create a record with both timestamps set to now and no expiry.
    pub fn new(id: impl Into<String>, payload: Bytes) -> Self {
        let now = now_epoch_ms();
        Self {
            id: id.into(),
            payload,
            created_at: now,
            last_updated_at: now,
            expiry_partition: None,
            expiry_timestamp: None,
        }
    }
}

/// The expiry-partition name for an instant: its UTC calendar date.
pub fn partition_for_ms(epoch_ms: i64) -> String {
    match DateTime::from_timestamp_millis(epoch_ms) {
        Some(ts) => ts.format("%Y-%m-%d").to_string(),
        // Out-of-range instants can never match a real partition.
        None => "0000-00-00".to_string(),
    }
}

/// Derive the expiry index fields for a record.
///
/// Returns `(None, None)` when the inactivity window is zero or below: an
/// immortal session must be invisible to the expiry index.
pub fn expiry_fields(
    last_updated_at: i64,
    max_inactive_secs: i64,
) -> (Option<String>, Option<i64>) {
    if max_inactive_secs <= 0 {
        return (None, None);
    }
    let expiry_ms = last_updated_at + max_inactive_secs * 1000;
    (Some(partition_for_ms(expiry_ms)), Some(expiry_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_formatting() {
        // 2026-08-06T00:00:01Z
        assert_eq!(partition_for_ms(1_785_974_401_000), "2026-08-06");
        assert_eq!(partition_for_ms(0), "1970-01-01");
    }

    #[test]
    fn test_expiry_fields_expirable() {
        let (partition, timestamp) = expiry_fields(1_000_000, 60);
        assert_eq!(timestamp, Some(1_060_000));
        assert_eq!(partition.as_deref(), Some("1970-01-01"));
    }

    #[test]
    fn test_expiry_fields_immortal() {
        assert_eq!(expiry_fields(1_000_000, 0), (None, None));
        assert_eq!(expiry_fields(1_000_000, -1), (None, None));
    }

    #[test]
    fn test_new_record_timestamps() {
        let record = SessionRecord::new("abc", Bytes::new());
        assert_eq!(record.created_at, record.last_updated_at);
        assert!(record.expiry_partition.is_none());
    }
}
