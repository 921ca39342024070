//! One-shot wiring of the session persistence stack.

use std::sync::Arc;

use seshat_codec::{ChunkCodec, CodecConfig};
use seshat_store::{
    ConverterChain, ExpiryReaper, ReaperConfig, ReaperHandle, SessionRecordStore, StoreConfig,
};
use seshat_table::SharedTableClient;

use crate::cache::SessionCache;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Builder for a [`SessionEngine`].
///
/// Every collaborator is injected here exactly once — table client,
/// converter chain, reaper — and handed to the components that use it.
/// Nothing in the stack reaches for process-wide state.
#[derive(Default)]
pub struct SessionStoreBuilder {
    table: Option<SharedTableClient>,
    codec_config: CodecConfig,
    store_config: StoreConfig,
    session_config: SessionConfig,
    reaper_config: Option<ReaperConfig>,
    chain: Option<ConverterChain>,
}

impl SessionStoreBuilder {
    /// Start a builder with default configuration everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table client. Required.
    pub fn with_table(mut self, table: SharedTableClient) -> Self {
        self.table = Some(table);
        self
    }

    /// Override the chunk codec configuration.
    pub fn with_codec_config(mut self, config: CodecConfig) -> Self {
        self.codec_config = config;
        self
    }

    /// Override the record store configuration.
    pub fn with_store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// Override the session cache configuration.
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Replace the standard converter chain.
    pub fn with_converter_chain(mut self, chain: ConverterChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Schedule an expiry reaper alongside the cache.
    ///
    /// When set, [`build`](Self::build) must run inside a tokio runtime so
    /// the reaper task can be spawned.
    pub fn with_reaper(mut self, config: ReaperConfig) -> Self {
        self.reaper_config = Some(config);
        self
    }

    /// Assemble the stack.
    pub fn build(self) -> Result<SessionEngine> {
        let table = self
            .table
            .ok_or_else(|| SessionError::Config("a table client is required".to_string()))?;

        let chain = Arc::new(self.chain.unwrap_or_else(|| {
            ConverterChain::current(self.session_config.legacy_max_inactive_interval)
        }));

        let store = Arc::new(SessionRecordStore::new(
            table,
            ChunkCodec::new(self.codec_config),
            self.store_config,
        ));

        let cache = Arc::new(SessionCache::new(
            Arc::clone(&store),
            chain,
            self.session_config,
        ));

        let reaper = self
            .reaper_config
            .map(|config| ReaperHandle::spawn(ExpiryReaper::new(Arc::clone(&store)), config));

        Ok(SessionEngine {
            cache,
            store,
            reaper,
        })
    }
}

/// The assembled session persistence stack.
pub struct SessionEngine {
    /// The host-facing cache.
    pub cache: Arc<SessionCache>,

    /// The underlying record store, for migration and operational tooling.
    pub store: Arc<SessionRecordStore>,

    /// Handle to the scheduled reaper, when one was configured.
    pub reaper: Option<ReaperHandle>,
}

impl SessionEngine {
    /// Shut down background work: stops the reaper schedule and waits for
    /// any in-flight scan to drain.
    pub async fn shutdown(self) {
        if let Some(reaper) = self.reaper {
            reaper.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seshat_table::MemoryTable;
    use seshat_types::SessionValue;

    #[tokio::test]
    async fn test_build_without_table_fails() {
        assert!(matches!(
            SessionStoreBuilder::new().build(),
            Err(SessionError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_build_and_use_defaults() {
        let engine = SessionStoreBuilder::new()
            .with_table(Arc::new(MemoryTable::new()))
            .build()
            .unwrap();
        assert!(engine.reaper.is_none());

        engine
            .cache
            .save(&SessionValue::new("abc", 60))
            .await
            .unwrap();
        assert!(engine.cache.load("abc").await.is_some());

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_build_with_reaper_spawns_and_stops() {
        let engine = SessionStoreBuilder::new()
            .with_table(Arc::new(MemoryTable::new()))
            .with_reaper(ReaperConfig::new())
            .build()
            .unwrap();

        let reaper = engine.reaper.as_ref().unwrap();
        assert!(!reaper.is_finished());

        engine.shutdown().await;
    }
}
