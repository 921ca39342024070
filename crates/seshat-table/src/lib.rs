//! Key-value table boundary.
//!
//! Everything above this crate talks to storage through the [`TableClient`]
//! trait: keyed get/put/delete on `(id, seq)` items, paginated scans, an
//! expiry-partition index query, and an approximate item count. Two backends
//! are provided:
//!
//! - [`MemoryTable`] — an in-process table for tests and embedded use.
//! - [`SqliteTable`] — a durable local table, one SQLite file in WAL mode.
//!
//! Neither backend distinguishes eventually-consistent from consistent
//! reads; the `consistent` flag exists for remote backends that do.

mod client;
mod error;
mod item;
mod memory;
mod retry;
mod sqlite;

pub use client::{SharedTableClient, TableClient};
pub use error::{Result, TableError};
pub use item::{ItemKey, ScanCursor, ScanPage, TableItem};
pub use memory::MemoryTable;
pub use retry::with_retry;
pub use sqlite::SqliteTable;
