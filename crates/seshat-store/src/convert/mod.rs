//! Versioned session/record conversion.
//!
//! A table can hold a mix of record formats while a schema migration is in
//! flight. Reads go through an ordered chain of [`SessionDecoder`]s: the
//! first decoder to accept the record wins entirely. Writes always use the
//! chain's single active [`SessionEncoder`], so new records land in the
//! current format while old ones stay loadable.

mod json;
mod legacy;

use seshat_types::SessionValue;
use thiserror::Error;
use tracing::debug;

use crate::record::SessionRecord;

pub use json::{JsonSessionDecoder, JsonSessionEncoder};
pub use legacy::{LegacyMapDecoder, LegacyMapEncoder};

/// Errors raised while converting between records and sessions.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The payload bytes could not be parsed in this converter's format.
    #[error("Unreadable session payload: {0}")]
    Payload(String),

    /// The payload parsed but a field is unusable.
    #[error("Invalid session field: {0}")]
    InvalidField(String),

    /// Every decoder in the chain rejected the record.
    #[error("No converter accepted the record after {attempts} attempts: {detail}")]
    Exhausted { attempts: usize, detail: String },

    /// The chain has no decoders registered.
    #[error("Converter chain has no decoders")]
    EmptyChain,
}

/// Decodes a stored record into a logical session.
pub trait SessionDecoder: Send + Sync {
    /// Short format name, used in logs and aggregated errors.
    fn name(&self) -> &'static str;

    /// Try to interpret the record. An error means "not my format" and the
    /// chain moves on to the next decoder.
    fn to_session(&self, record: &SessionRecord) -> Result<SessionValue, ConversionError>;
}

/// Encodes a logical session into a stored record.
pub trait SessionEncoder: Send + Sync {
    /// Convert the session. A failure here must not leave a partial record;
    /// callers only write on `Ok`.
    fn to_record(&self, session: &SessionValue) -> Result<SessionRecord, ConversionError>;
}

/// Ordered decoder chain plus the active write-side encoder.
pub struct ConverterChain {
    decoders: Vec<Box<dyn SessionDecoder>>,
    encoder: Box<dyn SessionEncoder>,
}

impl ConverterChain {
    /// A chain with the given active encoder and no decoders yet.
    pub fn new(encoder: Box<dyn SessionEncoder>) -> Self {
        Self {
            decoders: Vec::new(),
            encoder,
        }
    }

    /// The standard chain: JSON envelope writes, JSON-envelope-then-legacy
    /// reads. Legacy records carry no inactivity window of their own, so
    /// decoded legacy sessions get `legacy_max_inactive_interval` (seconds).
    pub fn current(legacy_max_inactive_interval: i64) -> Self {
        Self::new(Box::new(JsonSessionEncoder))
            .with_decoder(Box::new(JsonSessionDecoder))
            .with_decoder(Box::new(LegacyMapDecoder::new(
                legacy_max_inactive_interval,
            )))
    }

    /// Append a decoder, builder style. Order is fallback order.
    pub fn with_decoder(mut self, decoder: Box<dyn SessionDecoder>) -> Self {
        self.decoders.push(decoder);
        self
    }

    /// Number of registered decoders.
    pub fn decoder_count(&self) -> usize {
        self.decoders.len()
    }

    /// Decode a record, trying each decoder in registration order.
    ///
    /// The first success wins. If every decoder rejects the record, returns
    /// one aggregated [`ConversionError::Exhausted`] carrying each decoder's
    /// reason.
    pub fn to_session(&self, record: &SessionRecord) -> Result<SessionValue, ConversionError> {
        if self.decoders.is_empty() {
            return Err(ConversionError::EmptyChain);
        }

        let mut reasons = Vec::with_capacity(self.decoders.len());
        for decoder in &self.decoders {
            match decoder.to_session(record) {
                Ok(session) => return Ok(session),
                Err(e) => {
                    debug!(
                        session_id = %record.id,
                        decoder = decoder.name(),
                        error = %e,
                        "Decoder rejected record, trying next"
                    );
                    reasons.push(format!("{}: {e}", decoder.name()));
                }
            }
        }

        Err(ConversionError::Exhausted {
            attempts: self.decoders.len(),
            detail: reasons.join("; "),
        })
    }

    /// Encode a session with the active encoder.
    pub fn to_record(&self, session: &SessionValue) -> Result<SessionRecord, ConversionError> {
        self.encoder.to_record(session)
    }
}

impl std::fmt::Debug for ConverterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterChain")
            .field(
                "decoders",
                &self.decoders.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct AlwaysFails;

    impl SessionDecoder for AlwaysFails {
        fn name(&self) -> &'static str {
            "always-fails"
        }

        fn to_session(&self, _record: &SessionRecord) -> Result<SessionValue, ConversionError> {
            Err(ConversionError::Payload("nope".to_string()))
        }
    }

    struct AlwaysSucceeds;

    impl SessionDecoder for AlwaysSucceeds {
        fn name(&self) -> &'static str {
            "always-succeeds"
        }

        fn to_session(&self, record: &SessionRecord) -> Result<SessionValue, ConversionError> {
            Ok(SessionValue::new(record.id.clone(), 60))
        }
    }

    fn record() -> SessionRecord {
        SessionRecord::new("abc", Bytes::from_static(b"{}"))
    }

    #[test]
    fn test_first_success_wins() {
        let chain = ConverterChain::new(Box::new(JsonSessionEncoder))
            .with_decoder(Box::new(AlwaysFails))
            .with_decoder(Box::new(AlwaysSucceeds));

        let session = chain.to_session(&record()).unwrap();
        assert_eq!(session.id, "abc");
    }

    #[test]
    fn test_all_failing_aggregates() {
        let chain = ConverterChain::new(Box::new(JsonSessionEncoder))
            .with_decoder(Box::new(AlwaysFails))
            .with_decoder(Box::new(AlwaysFails));

        match chain.to_session(&record()) {
            Err(ConversionError::Exhausted { attempts, detail }) => {
                assert_eq!(attempts, 2);
                assert!(detail.contains("always-fails"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_chain_errors() {
        let chain = ConverterChain::new(Box::new(JsonSessionEncoder));
        assert!(matches!(
            chain.to_session(&record()),
            Err(ConversionError::EmptyChain)
        ));
    }

    #[test]
    fn test_current_chain_round_trip() {
        let chain = ConverterChain::current(1800);
        let session =
            SessionValue::new("abc", 300).with_attribute("user", serde_json::json!("alice"));

        let record = chain.to_record(&session).unwrap();
        let decoded = chain.to_session(&record).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_current_chain_reads_legacy_records() {
        let chain = ConverterChain::current(900);

        let legacy = LegacyMapEncoder
            .to_record(
                &SessionValue::new("old", 0).with_attribute("k", serde_json::json!([1, 2, 3])),
            )
            .unwrap();

        let decoded = chain.to_session(&legacy).unwrap();
        assert_eq!(decoded.id, "old");
        assert_eq!(decoded.max_inactive_interval, 900);
        assert_eq!(decoded.attribute("k"), Some(&serde_json::json!([1, 2, 3])));
    }
}
