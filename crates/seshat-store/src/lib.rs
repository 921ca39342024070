//! Session record persistence for Seshat.
//!
//! This crate maps logical session records onto chunked table items and
//! keeps the table clean:
//!
//! - [`SessionRecordStore`] — chunk-aware CRUD with incremental reads,
//!   per-item retries, and paginated scans.
//! - [`ConverterChain`] — versioned conversion between stored records and
//!   logical sessions, so old and new record formats coexist during
//!   migration.
//! - [`ExpiryReaper`] — background deletion of records past their
//!   inactivity window, scheduled with start jitter and cooperative
//!   shutdown.

pub mod convert;
mod error;
mod record;
mod reaper;
mod store;

pub use convert::{
    ConversionError, ConverterChain, JsonSessionDecoder, JsonSessionEncoder, LegacyMapDecoder,
    LegacyMapEncoder, SessionDecoder, SessionEncoder,
};
pub use error::{Result, StoreError};
pub use record::{expiry_fields, partition_for_ms, SessionRecord};
pub use reaper::{is_expired, ExpiryReaper, ReapSummary, ReaperConfig, ReaperHandle};
pub use store::{
    ExpiryCandidate, GetOutcome, RecordHead, RecordScan, SessionRecordStore, StoreConfig,
};
