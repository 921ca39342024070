//! Current record format: a JSON envelope of the full session value.

use bytes::Bytes;
use seshat_types::SessionValue;

use crate::record::{expiry_fields, SessionRecord};

use super::{ConversionError, SessionDecoder, SessionEncoder};

/// Writes the full [`SessionValue`] as a JSON envelope and stamps the
/// record's metadata and expiry index fields.
pub struct JsonSessionEncoder;

impl SessionEncoder for JsonSessionEncoder {
    fn to_record(&self, session: &SessionValue) -> Result<SessionRecord, ConversionError> {
        if session.id.is_empty() {
            return Err(ConversionError::InvalidField(
                "session id is empty".to_string(),
            ));
        }

        let payload = serde_json::to_vec(session)
            .map_err(|e| ConversionError::Payload(format!("serializing session: {e}")))?;

        let (expiry_partition, expiry_timestamp) =
            expiry_fields(session.last_accessed_time, session.max_inactive_interval);

        Ok(SessionRecord {
            id: session.id.clone(),
            payload: Bytes::from(payload),
            created_at: session.creation_time,
            last_updated_at: session.last_accessed_time,
            expiry_partition,
            expiry_timestamp,
        })
    }
}

/// Reads the JSON envelope format written by [`JsonSessionEncoder`].
pub struct JsonSessionDecoder;

impl SessionDecoder for JsonSessionDecoder {
    fn name(&self) -> &'static str {
        "json-envelope"
    }

    fn to_session(&self, record: &SessionRecord) -> Result<SessionValue, ConversionError> {
        let session: SessionValue = serde_json::from_slice(&record.payload)
            .map_err(|e| ConversionError::Payload(format!("parsing envelope: {e}")))?;

        // A payload copied under a different key is not this session.
        if session.id != record.id {
            return Err(ConversionError::InvalidField(format!(
                "payload id {:?} does not match record id {:?}",
                session.id, record.id
            )));
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let session = SessionValue::new("abc", 120)
            .with_attribute("name", json!("alice"))
            .with_attribute("cart", json!({"items": 3}));

        let record = JsonSessionEncoder.to_record(&session).unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.created_at, session.creation_time);
        assert_eq!(record.last_updated_at, session.last_accessed_time);
        assert_eq!(
            record.expiry_timestamp,
            Some(session.last_accessed_time + 120_000)
        );

        let decoded = JsonSessionDecoder.to_session(&record).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_immortal_session_has_no_expiry_fields() {
        let record = JsonSessionEncoder
            .to_record(&SessionValue::new("abc", -1))
            .unwrap();
        assert_eq!(record.expiry_partition, None);
        assert_eq!(record.expiry_timestamp, None);
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(matches!(
            JsonSessionEncoder.to_record(&SessionValue::new("", 60)),
            Err(ConversionError::InvalidField(_))
        ));
    }

    #[test]
    fn test_id_mismatch_rejected() {
        let mut record = JsonSessionEncoder
            .to_record(&SessionValue::new("abc", 60))
            .unwrap();
        record.id = "other".to_string();

        assert!(matches!(
            JsonSessionDecoder.to_session(&record),
            Err(ConversionError::InvalidField(_))
        ));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let record = SessionRecord::new("abc", Bytes::from_static(&[0xff, 0xfe, 0x00]));
        assert!(matches!(
            JsonSessionDecoder.to_session(&record),
            Err(ConversionError::Payload(_))
        ));
    }
}
