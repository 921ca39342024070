//! In-memory table backend.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::client::TableClient;
use crate::error::{Result, TableError};
use crate::item::{ItemKey, ScanCursor, ScanPage, TableItem};

/// An in-process table over an ordered map.
///
/// Primary backend for unit and integration tests, usable as an embedded
/// non-durable store. The ordered map makes scan cursors trivial: the cursor
/// is the last key of the previous page.
#[derive(Debug, Default)]
pub struct MemoryTable {
    items: RwLock<BTreeMap<(String, u32), TableItem>>,
    fail_ops: AtomicUsize,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` operations fail with [`TableError::Unavailable`].
    ///
    /// Test hook for exercising transient-failure handling upstream.
    pub fn inject_unavailable(&self, n: usize) {
        self.fail_ops.store(n, Ordering::SeqCst);
    }

    /// Number of items currently stored.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the table holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn check_fault(&self) -> Result<()> {
        let remaining = self
            .fail_ops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match remaining {
            Ok(_) => Err(TableError::Unavailable(
                "injected transient failure".to_string(),
            )),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl TableClient for MemoryTable {
    async fn get_item(&self, key: &ItemKey, _consistent: bool) -> Result<Option<TableItem>> {
        self.check_fault()?;
        Ok(self
            .items
            .read()
            .get(&(key.id.clone(), key.seq))
            .cloned())
    }

    async fn put_item(&self, item: TableItem) -> Result<()> {
        self.check_fault()?;
        self.items
            .write()
            .insert((item.id.clone(), item.seq), item);
        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<()> {
        self.check_fault()?;
        self.items.write().remove(&(key.id.clone(), key.seq));
        Ok(())
    }

    async fn scan(&self, cursor: Option<ScanCursor>, limit: usize) -> Result<ScanPage> {
        self.check_fault()?;
        let start = match cursor {
            Some(cursor) => Bound::Excluded(cursor.decode()?),
            None => Bound::Unbounded,
        };

        let items: Vec<TableItem> = self
            .items
            .read()
            .range((start, Bound::Unbounded))
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect();

        let cursor = if items.len() == limit {
            items
                .last()
                .map(|item| ScanCursor::encode(&item.id, item.seq))
        } else {
            None
        };
        Ok(ScanPage { items, cursor })
    }

    async fn query_expiry_index(&self, partition: &str) -> Result<Vec<TableItem>> {
        self.check_fault()?;
        let mut items: Vec<TableItem> = self
            .items
            .read()
            .values()
            .filter(|item| item.expiry_partition.as_deref() == Some(partition))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.expiry_timestamp);
        Ok(items)
    }

    async fn approximate_item_count(&self) -> Result<u64> {
        self.check_fault()?;
        Ok(self.items.read().len() as u64)
    }
}
