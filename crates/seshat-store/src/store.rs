//! Chunk-aware CRUD over the table boundary.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use seshat_codec::{Assembly, ChunkAssembler, ChunkCodec};
use seshat_table::{with_retry, ItemKey, ScanCursor, SharedTableClient, TableItem};
use tracing::{debug, warn};

use crate::error::Result;
use crate::record::SessionRecord;

/// Configuration for [`SessionRecordStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Request strongly-consistent reads on every chunk fetch.
    pub consistent_read: bool,

    /// Retries for transient table errors, per item operation.
    pub max_retries: u32,

    /// Initial backoff between retries; doubles per attempt.
    pub retry_backoff: Duration,

    /// Items per page on full-table scans.
    pub scan_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            consistent_read: false,
            max_retries: 2,
            retry_backoff: Duration::from_millis(50),
            scan_page_size: 100,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request strongly-consistent reads.
    pub fn with_consistent_read(mut self, consistent: bool) -> Self {
        self.consistent_read = consistent;
        self
    }

    /// Set the per-operation retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the scan page size.
    pub fn with_scan_page_size(mut self, size: usize) -> Self {
        self.scan_page_size = size;
        self
    }
}

/// Outcome of a record read.
///
/// Missing and corrupt records are expected states, not errors; callers
/// branch on the variant instead of catching.
#[derive(Debug)]
pub enum GetOutcome {
    /// A complete record was read and decoded.
    Found(SessionRecord),

    /// No record for this id, or the record vanished or lost chunks while
    /// being read.
    NotFound,

    /// The record's bytes cannot be decoded.
    Corrupt {
        /// What the codec rejected.
        reason: String,
    },
}

impl GetOutcome {
    /// The record, if one was found.
    pub fn found(self) -> Option<SessionRecord> {
        match self {
            GetOutcome::Found(record) => Some(record),
            _ => None,
        }
    }
}

/// Fresh metadata from a record's primary chunk.
#[derive(Debug, Clone, Copy)]
pub struct RecordHead {
    /// Creation time (epoch ms), if present.
    pub created_at: Option<i64>,

    /// Last save time (epoch ms), if present.
    pub last_updated_at: Option<i64>,

    /// Absolute expiry instant (epoch ms); `None` means immortal.
    pub expiry_timestamp: Option<i64>,
}

/// A record surfaced by an expiry-partition query.
///
/// Index data may lag the record itself; re-verify against a fresh
/// [`RecordHead`] before acting on it.
#[derive(Debug, Clone)]
pub struct ExpiryCandidate {
    /// Session id.
    pub id: String,

    /// Last save time as the index saw it.
    pub last_updated_at: Option<i64>,

    /// Expiry instant as the index saw it.
    pub expiry_timestamp: Option<i64>,
}

/// Maps session records onto physical `(id, seq)` table items.
///
/// Multi-chunk records are read incrementally (chunk 1 declares the total
/// length, further chunks are fetched on demand) and written as independent
/// per-item puts. Writes are therefore not atomic across chunks: a crash
/// mid-put leaves a partially-updated record, which readers surface as
/// `NotFound` or `Corrupt` rather than a crash.
pub struct SessionRecordStore {
    table: SharedTableClient,
    codec: ChunkCodec,
    config: StoreConfig,
}

impl SessionRecordStore {
    /// Create a store over the given table.
    pub fn new(table: SharedTableClient, codec: ChunkCodec, config: StoreConfig) -> Self {
        Self {
            table,
            codec,
            config,
        }
    }

    /// Read a record using the configured consistency.
    pub async fn get(&self, id: &str) -> Result<GetOutcome> {
        self.get_with_consistency(id, self.config.consistent_read)
            .await
    }

    /// Read a record, explicitly choosing read consistency.
    ///
    /// Use a consistent read when read-after-write matters, e.g. right
    /// after a failover.
    pub async fn get_with_consistency(&self, id: &str, consistent: bool) -> Result<GetOutcome> {
        let primary = self.fetch_item(&ItemKey::primary(id), consistent).await?;
        match primary {
            Some(item) => self.assemble(item, consistent).await,
            None => Ok(GetOutcome::NotFound),
        }
    }

    /// Write a record, replacing any prior record with the same id.
    ///
    /// Returns the number of chunks written. Each chunk is an independent
    /// put; only chunk 1 carries metadata and expiry index fields.
    pub async fn put(&self, record: &SessionRecord) -> Result<usize> {
        let chunks = self.codec.encode(&record.id, &record.payload)?;
        let count = chunks.len();

        for (i, data) in chunks.into_iter().enumerate() {
            let seq = (i + 1) as u32;
            let mut item = TableItem::chunk(record.id.clone(), seq, data);
            if seq == 1 {
                item.created_at = Some(record.created_at);
                item.last_updated_at = Some(record.last_updated_at);
                item.expiry_partition = record.expiry_partition.clone();
                item.expiry_timestamp = record.expiry_timestamp;
            }
            self.put_item(item).await?;
        }

        debug!(session_id = %record.id, chunks = count, "Stored session record");
        Ok(count)
    }

    /// Delete a record's primary chunk. Idempotent.
    ///
    /// Trailing chunks of a multi-chunk record are deliberately left behind
    /// as orphans for the reaper: deleting them here would require a read
    /// before every delete.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.delete_item(ItemKey::primary(id)).await?;
        debug!(session_id = %id, "Deleted session record");
        Ok(())
    }

    /// Delete every chunk of a record that can be enumerated, walking
    /// sequence numbers until one is missing. Returns chunks removed.
    pub async fn delete_all_chunks(&self, id: &str) -> Result<usize> {
        self.delete_item(ItemKey::primary(id)).await?;
        let mut removed = 1;

        let mut seq = 2;
        while self
            .fetch_item(&ItemKey::new(id, seq), self.config.consistent_read)
            .await?
            .is_some()
        {
            self.delete_item(ItemKey::new(id, seq)).await?;
            removed += 1;
            seq += 1;
        }
        Ok(removed)
    }

    /// Approximate number of items in the table.
    ///
    /// May lag real-time state by hours; diagnostics and sizing only.
    pub async fn count(&self) -> Result<u64> {
        let table = &self.table;
        Ok(with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "approximate_item_count",
            || table.approximate_item_count(),
        )
        .await?)
    }

    /// Start a full-table scan of logical records.
    ///
    /// Each call starts over from the beginning; pages are fetched lazily.
    pub fn scan_all(&self) -> RecordScan<'_> {
        RecordScan {
            store: self,
            cursor: None,
            done: false,
        }
    }

    /// Ids of every logical record in the table.
    ///
    /// Scans primary chunks only, without assembling payloads; used to
    /// re-sync local key tracking with what other instances have written.
    pub async fn scan_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.scan_page(cursor).await?;
            let next = page.cursor;
            ids.extend(
                page.items
                    .into_iter()
                    .filter(TableItem::is_primary)
                    .map(|item| item.id),
            );
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(ids)
    }

    /// Fresh metadata for a record's primary chunk, read consistently.
    pub async fn head(&self, id: &str) -> Result<Option<RecordHead>> {
        Ok(self
            .fetch_item(&ItemKey::primary(id), true)
            .await?
            .map(|item| RecordHead {
                created_at: item.created_at,
                last_updated_at: item.last_updated_at,
                expiry_timestamp: item.expiry_timestamp,
            }))
    }

    /// Records the expiry index holds under one partition.
    pub async fn expired_candidates(&self, partition: &str) -> Result<Vec<ExpiryCandidate>> {
        let table = &self.table;
        let items = with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "query_expiry_index",
            || table.query_expiry_index(partition),
        )
        .await?;

        Ok(items
            .into_iter()
            .filter(TableItem::is_primary)
            .map(|item| ExpiryCandidate {
                id: item.id,
                last_updated_at: item.last_updated_at,
                expiry_timestamp: item.expiry_timestamp,
            })
            .collect())
    }

    /// Delete data chunks whose primary chunk no longer exists.
    ///
    /// Operational tooling for reclaiming orphans left by primary-only
    /// deletes; runs a full scan, so schedule it deliberately.
    pub async fn sweep_orphans(&self) -> Result<usize> {
        let mut live = HashSet::new();
        let mut orphans = Vec::new();

        let mut cursor = None;
        loop {
            let page = self.scan_page(cursor).await?;
            for item in &page.items {
                if item.is_primary() {
                    live.insert(item.id.clone());
                } else {
                    orphans.push(item.key());
                }
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let mut removed = 0;
        for key in orphans {
            if !live.contains(&key.id) {
                self.delete_item(key).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Swept orphan chunks");
        }
        Ok(removed)
    }

    async fn assemble(&self, primary: TableItem, consistent: bool) -> Result<GetOutcome> {
        let id = primary.id.clone();

        let (Some(created_at), Some(last_updated_at)) =
            (primary.created_at, primary.last_updated_at)
        else {
            warn!(
                session_id = %id,
                "Primary chunk is missing metadata attributes, treating as not found"
            );
            return Ok(GetOutcome::NotFound);
        };

        let mut assembler = ChunkAssembler::new();
        let mut step = assembler.push(&primary.data);
        loop {
            match step {
                Ok(Assembly::Complete(raw)) => {
                    return Ok(GetOutcome::Found(SessionRecord {
                        id,
                        payload: Bytes::from(raw),
                        created_at,
                        last_updated_at,
                        expiry_partition: primary.expiry_partition.clone(),
                        expiry_timestamp: primary.expiry_timestamp,
                    }));
                }
                Ok(Assembly::NeedMore { next_seq }) => {
                    let chunk = self
                        .fetch_item(&ItemKey::new(id.as_str(), next_seq), consistent)
                        .await?;
                    match chunk {
                        Some(chunk) if !chunk.data.is_empty() => {
                            step = assembler.push(&chunk.data);
                        }
                        // A missing or empty follow-up chunk usually means a
                        // concurrent delete caught mid-read, not corruption.
                        _ => {
                            debug!(
                                session_id = %id,
                                seq = next_seq,
                                "Chunk missing mid-read, treating record as not found"
                            );
                            return Ok(GetOutcome::NotFound);
                        }
                    }
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Stored record is corrupt");
                    return Ok(GetOutcome::Corrupt {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn scan_page(&self, cursor: Option<ScanCursor>) -> Result<seshat_table::ScanPage> {
        let table = &self.table;
        let limit = self.config.scan_page_size;
        Ok(with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "scan",
            || table.scan(cursor.clone(), limit),
        )
        .await?)
    }

    async fn fetch_item(&self, key: &ItemKey, consistent: bool) -> Result<Option<TableItem>> {
        let table = &self.table;
        Ok(with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "get_item",
            || table.get_item(key, consistent),
        )
        .await?)
    }

    async fn put_item(&self, item: TableItem) -> Result<()> {
        let table = &self.table;
        Ok(with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "put_item",
            || table.put_item(item.clone()),
        )
        .await?)
    }

    async fn delete_item(&self, key: ItemKey) -> Result<()> {
        let table = &self.table;
        Ok(with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "delete_item",
            || table.delete_item(&key),
        )
        .await?)
    }
}

impl std::fmt::Debug for SessionRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecordStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Lazy full-table scan of logical records.
///
/// Follows continuation cursors page by page; non-primary chunks are fetched
/// on demand while assembling, and orphan or corrupt records are skipped
/// with a log line rather than aborting the scan.
pub struct RecordScan<'a> {
    store: &'a SessionRecordStore,
    cursor: Option<ScanCursor>,
    done: bool,
}

impl RecordScan<'_> {
    /// Fetch the next page of assembled records.
    ///
    /// Returns an empty vector once the scan is exhausted.
    pub async fn next_page(&mut self) -> Result<Vec<SessionRecord>> {
        while !self.done {
            let page = self.store.scan_page(self.cursor.take()).await?;
            self.cursor = page.cursor;
            if self.cursor.is_none() {
                self.done = true;
            }

            let mut records = Vec::new();
            for item in page.items.into_iter().filter(TableItem::is_primary) {
                let id = item.id.clone();
                match self
                    .store
                    .assemble(item, self.store.config.consistent_read)
                    .await?
                {
                    GetOutcome::Found(record) => records.push(record),
                    GetOutcome::NotFound => {
                        debug!(session_id = %id, "Record vanished during scan, skipping")
                    }
                    GetOutcome::Corrupt { reason } => {
                        warn!(session_id = %id, reason = %reason, "Skipping corrupt record during scan")
                    }
                }
            }
            if !records.is_empty() {
                return Ok(records);
            }
        }
        Ok(Vec::new())
    }

    /// Collect every remaining record. Test and tooling convenience.
    pub async fn collect_all(mut self) -> Result<Vec<SessionRecord>> {
        let mut all = Vec::new();
        loop {
            let page = self.next_page().await?;
            if page.is_empty() {
                return Ok(all);
            }
            all.extend(page);
        }
    }
}
