//! The table client trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::item::{ItemKey, ScanCursor, ScanPage, TableItem};

/// Storage operations Seshat needs from a key-value table.
///
/// Implementations map these onto their native API. All operations are
/// per-item; there is no multi-item atomicity, and callers must not assume
/// any ordering between concurrent writers beyond last-writer-wins per item.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Fetch a single item by key.
    ///
    /// `consistent` requests a strongly-consistent read where the backend
    /// distinguishes one; local backends are always consistent and may
    /// ignore it.
    async fn get_item(&self, key: &ItemKey, consistent: bool) -> Result<Option<TableItem>>;

    /// Write an item, fully replacing any existing item with the same key.
    async fn put_item(&self, item: TableItem) -> Result<()>;

    /// Delete an item. Deleting a key that does not exist is a no-op.
    async fn delete_item(&self, key: &ItemKey) -> Result<()>;

    /// Fetch one page of a full-table scan.
    ///
    /// Pass the previous page's cursor to continue; `None` starts over from
    /// the beginning. Ordering across pages is stable within one backend but
    /// callers must not rely on any particular order.
    async fn scan(&self, cursor: Option<ScanCursor>, limit: usize) -> Result<ScanPage>;

    /// All items whose expiry partition equals `partition`, in ascending
    /// expiry-timestamp order.
    async fn query_expiry_index(&self, partition: &str) -> Result<Vec<TableItem>>;

    /// Approximate number of items in the table.
    ///
    /// May lag real-time state; diagnostics and sizing only, never
    /// correctness decisions.
    async fn approximate_item_count(&self) -> Result<u64>;
}

/// Shared, dynamically-dispatched table client.
pub type SharedTableClient = Arc<dyn TableClient>;
