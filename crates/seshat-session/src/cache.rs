//! The read-through session cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use seshat_store::{ConverterChain, GetOutcome, SessionRecordStore};
use seshat_types::SessionValue;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Result;

/// Request-facing façade over the record store and converter chain.
///
/// Sessions the host already holds in memory never reach this layer; every
/// call here goes to storage. The local key set exists for enumeration
/// only — it is rebuilt empty on restart, repopulated lazily by loads and
/// saves, and must never be treated as the source of truth.
pub struct SessionCache {
    store: Arc<SessionRecordStore>,
    chain: Arc<ConverterChain>,
    config: SessionConfig,
    keys: RwLock<HashSet<String>>,
    keys_refreshed_at: Mutex<Option<Instant>>,
}

impl SessionCache {
    /// Create a cache over the given store and converter chain.
    pub fn new(
        store: Arc<SessionRecordStore>,
        chain: Arc<ConverterChain>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            chain,
            config,
            keys: RwLock::new(HashSet::new()),
            keys_refreshed_at: Mutex::new(None),
        }
    }

    /// The cache configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Load a session from storage.
    ///
    /// A missing record, a corrupt record, and an unreachable table all
    /// look identical to the host: no session. Corrupt records are deleted
    /// first when [`SessionConfig::delete_corrupt_records`] is set.
    pub async fn load(&self, id: &str) -> Option<SessionValue> {
        match self.store.get(id).await {
            Ok(GetOutcome::Found(record)) => match self.chain.to_session(&record) {
                Ok(session) => {
                    self.keys.write().insert(id.to_string());
                    Some(session)
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Stored session is unreadable");
                    self.discard_corrupt(id).await;
                    None
                }
            },
            Ok(GetOutcome::NotFound) => {
                self.keys.write().remove(id);
                None
            }
            Ok(GetOutcome::Corrupt { reason }) => {
                warn!(session_id = %id, reason = %reason, "Stored session is corrupt");
                self.discard_corrupt(id).await;
                None
            }
            Err(e) => {
                warn!(
                    session_id = %id,
                    error = %e,
                    "Session load failed, treating as no session"
                );
                None
            }
        }
    }

    /// Persist a session, fully replacing any prior record with its id.
    ///
    /// Unlike loads, failures here propagate: the host must know a write
    /// was dropped.
    pub async fn save(&self, session: &SessionValue) -> Result<()> {
        let record = self.chain.to_record(session)?;
        self.store.put(&record).await?;
        self.keys.write().insert(session.id.clone());
        debug!(session_id = %session.id, "Session saved");
        Ok(())
    }

    /// Remove a session. Idempotent; storage failures are logged, not
    /// propagated, and corrected by the reaper.
    pub async fn remove(&self, id: &str) {
        self.keys.write().remove(id);
        if let Err(e) = self.store.delete(id).await {
            warn!(session_id = %id, error = %e, "Failed to delete session record");
        }
    }

    /// Delete every locally-known session in the background.
    ///
    /// The local key set is cleared immediately; the deletes run on a
    /// spawned task and may still be in flight when this returns. The
    /// handle resolves to the number of records deleted, for callers that
    /// need to wait.
    pub fn clear(&self) -> JoinHandle<usize> {
        let snapshot: Vec<String> = self.keys.write().drain().collect();
        let store = Arc::clone(&self.store);

        info!(sessions = snapshot.len(), "Clearing locally-known sessions");
        tokio::spawn(async move {
            let mut deleted = 0;
            for id in snapshot {
                match store.delete(&id).await {
                    Ok(()) => deleted += 1,
                    Err(e) => {
                        warn!(session_id = %id, error = %e, "Failed to delete session during clear")
                    }
                }
            }
            info!(deleted, "Session clear completed");
            deleted
        })
    }

    /// Snapshot of the locally-known session ids.
    pub fn keys(&self) -> Vec<String> {
        self.keys.read().iter().cloned().collect()
    }

    /// Whether an id is locally known. Enumeration aid, not a liveness
    /// check.
    pub fn contains_key(&self, id: &str) -> bool {
        self.keys.read().contains(id)
    }

    /// Re-sync the local key set from a table scan.
    ///
    /// Other instances add and remove sessions behind our back, so hosts
    /// that enumerate keys should call this periodically. No-op when the
    /// last sync is younger than the configured refresh interval.
    pub async fn refresh_keys(&self) -> Result<()> {
        {
            let last = self.keys_refreshed_at.lock();
            if let Some(at) = *last {
                if at.elapsed() < self.config.keys_refresh_interval {
                    return Ok(());
                }
            }
        }

        let ids = self.store.scan_ids().await?;
        let count = ids.len();
        {
            let mut keys = self.keys.write();
            keys.clear();
            keys.extend(ids);
        }
        *self.keys_refreshed_at.lock() = Some(Instant::now());

        debug!(keys = count, "Key set re-synced from table");
        Ok(())
    }

    /// Approximate number of stored sessions; diagnostics only.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.store.count().await?)
    }

    async fn discard_corrupt(&self, id: &str) {
        self.keys.write().remove(id);
        if !self.config.delete_corrupt_records {
            return;
        }
        info!(session_id = %id, "Deleting corrupt session record");
        if let Err(e) = self.store.delete(id).await {
            warn!(session_id = %id, error = %e, "Failed to delete corrupt session record");
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("config", &self.config)
            .field("known_keys", &self.keys.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use seshat_codec::{ChunkCodec, CodecConfig};
    use seshat_store::StoreConfig;
    use seshat_table::{ItemKey, MemoryTable, TableClient, TableItem};
    use serde_json::json;

    fn cache_over(table: Arc<MemoryTable>, config: SessionConfig) -> SessionCache {
        let store = Arc::new(SessionRecordStore::new(
            table,
            ChunkCodec::new(CodecConfig::default()),
            StoreConfig::default(),
        ));
        let chain = Arc::new(ConverterChain::current(
            config.legacy_max_inactive_interval,
        ));
        SessionCache::new(store, chain, config)
    }

    async fn put_garbage_record(table: &MemoryTable, id: &str) {
        // Valid chunk framing around bytes no converter can read.
        let mut payload = Vec::new();
        payload.extend_from_slice(&3u32.to_be_bytes());
        payload.extend_from_slice(&3u32.to_be_bytes());
        payload.extend_from_slice(&[0xff, 0xfe, 0xfd]);

        let mut item = TableItem::chunk(id, 1, Bytes::from(payload));
        item.created_at = Some(0);
        item.last_updated_at = Some(0);
        table.put_item(item).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(table, SessionConfig::default());

        let session = SessionValue::new("abc", 1800).with_attribute("user", json!("alice"));
        cache.save(&session).await.unwrap();

        let loaded = cache.load("abc").await.unwrap();
        assert_eq!(loaded, session);
        assert!(cache.contains_key("abc"));
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(table, SessionConfig::default());

        assert!(cache.load("ghost").await.is_none());
        assert!(!cache.contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_corrupt_record_deleted_when_policy_enabled() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(table.clone(), SessionConfig::default());

        put_garbage_record(&table, "bad").await;
        assert!(cache.load("bad").await.is_none());

        // The unreadable record was deleted from storage.
        assert!(table
            .get_item(&ItemKey::primary("bad"), false)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_kept_when_policy_disabled() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(
            table.clone(),
            SessionConfig::default().with_delete_corrupt_records(false),
        );

        put_garbage_record(&table, "bad").await;
        assert!(cache.load("bad").await.is_none());

        // Left in place for manual inspection.
        assert!(table
            .get_item(&ItemKey::primary("bad"), false)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(table, SessionConfig::default());

        cache.save(&SessionValue::new("abc", 60)).await.unwrap();
        cache.remove("abc").await;
        cache.remove("abc").await;

        assert!(cache.load("abc").await.is_none());
        assert!(!cache.contains_key("abc"));
    }

    #[tokio::test]
    async fn test_load_survives_storage_outage() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(table.clone(), SessionConfig::default());

        cache.save(&SessionValue::new("abc", 60)).await.unwrap();

        // Outlast the retry budget: every attempt fails.
        table.inject_unavailable(100);
        assert!(cache.load("abc").await.is_none());
        table.inject_unavailable(0);

        // The record itself was never touched.
        assert!(cache.load("abc").await.is_some());
    }

    #[tokio::test]
    async fn test_save_propagates_storage_errors() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(table.clone(), SessionConfig::default());

        table.inject_unavailable(100);
        let result = cache.save(&SessionValue::new("abc", 60)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_deletes_in_background() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(table.clone(), SessionConfig::default());

        for i in 0..5 {
            cache
                .save(&SessionValue::new(format!("s{i}"), 60))
                .await
                .unwrap();
        }

        let handle = cache.clear();
        // Membership is cleared immediately, before deletes finish.
        assert!(cache.keys().is_empty());

        let deleted = handle.await.unwrap();
        assert_eq!(deleted, 5);
        assert!(cache.load("s0").await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_keys_resyncs_and_rate_limits() {
        let table = Arc::new(MemoryTable::new());
        let cache = cache_over(table.clone(), SessionConfig::default());
        let other = cache_over(table, SessionConfig::default());

        // Another instance wrote sessions we have never seen.
        other.save(&SessionValue::new("remote-1", 60)).await.unwrap();
        other.save(&SessionValue::new("remote-2", 60)).await.unwrap();
        assert!(cache.keys().is_empty());

        cache.refresh_keys().await.unwrap();
        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(keys, vec!["remote-1", "remote-2"]);

        // Within the refresh interval the second sync is a no-op.
        other.save(&SessionValue::new("remote-3", 60)).await.unwrap();
        cache.refresh_keys().await.unwrap();
        assert_eq!(cache.keys().len(), 2);
    }
}
