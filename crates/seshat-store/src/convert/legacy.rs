//! Legacy record format: a bare JSON attribute map.
//!
//! Early deployments stored only the attribute map in the payload; session
//! metadata lived in the record attributes and the inactivity window was
//! not stored at all. The decoder stays registered so those records remain
//! loadable during migration; the encoder exists for migration tooling and
//! tests that need to fabricate old-format records.

use std::collections::BTreeMap;

use bytes::Bytes;
use seshat_types::SessionValue;

use crate::record::SessionRecord;

use super::{ConversionError, SessionDecoder, SessionEncoder};

/// Reads bare-attribute-map records.
///
/// Must be registered after [`JsonSessionDecoder`](super::JsonSessionDecoder):
/// a JSON envelope is itself a JSON object and would otherwise decode as a
/// map of its envelope fields.
pub struct LegacyMapDecoder {
    default_max_inactive_interval: i64,
}

impl LegacyMapDecoder {
    /// Decoder assigning `default_max_inactive_interval` (seconds) to every
    /// decoded session, mirroring how the window was configured rather than
    /// stored in the legacy deployment.
    pub fn new(default_max_inactive_interval: i64) -> Self {
        Self {
            default_max_inactive_interval,
        }
    }
}

impl SessionDecoder for LegacyMapDecoder {
    fn name(&self) -> &'static str {
        "legacy-map"
    }

    fn to_session(&self, record: &SessionRecord) -> Result<SessionValue, ConversionError> {
        let attributes: BTreeMap<String, serde_json::Value> =
            serde_json::from_slice(&record.payload)
                .map_err(|e| ConversionError::Payload(format!("parsing attribute map: {e}")))?;

        Ok(SessionValue {
            id: record.id.clone(),
            creation_time: record.created_at,
            last_accessed_time: record.last_updated_at,
            max_inactive_interval: self.default_max_inactive_interval,
            attributes,
        })
    }
}

/// Writes bare-attribute-map records. Migration tooling and tests only.
pub struct LegacyMapEncoder;

impl SessionEncoder for LegacyMapEncoder {
    fn to_record(&self, session: &SessionValue) -> Result<SessionRecord, ConversionError> {
        if session.id.is_empty() {
            return Err(ConversionError::InvalidField(
                "session id is empty".to_string(),
            ));
        }

        let payload = serde_json::to_vec(&session.attributes)
            .map_err(|e| ConversionError::Payload(format!("serializing attributes: {e}")))?;

        // Legacy records never carried expiry index fields.
        Ok(SessionRecord {
            id: session.id.clone(),
            payload: Bytes::from(payload),
            created_at: session.creation_time,
            last_updated_at: session.last_accessed_time,
            expiry_partition: None,
            expiry_timestamp: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_round_trip() {
        let session = SessionValue::new("legacy-1", 600)
            .with_attribute("user", json!("bob"))
            .with_attribute("visits", json!(7));

        let record = LegacyMapEncoder.to_record(&session).unwrap();
        assert_eq!(record.expiry_partition, None);

        let decoded = LegacyMapDecoder::new(600).to_session(&record).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_window_comes_from_configuration() {
        let record = LegacyMapEncoder
            .to_record(&SessionValue::new("legacy-1", 600))
            .unwrap();

        let decoded = LegacyMapDecoder::new(30).to_session(&record).unwrap();
        assert_eq!(decoded.max_inactive_interval, 30);
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let record = SessionRecord::new("x", Bytes::from_static(b"[1, 2, 3]"));
        assert!(matches!(
            LegacyMapDecoder::new(60).to_session(&record),
            Err(ConversionError::Payload(_))
        ));
    }
}
