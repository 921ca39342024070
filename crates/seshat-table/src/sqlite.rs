//! SQLite table backend.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use tracing::info;

use crate::client::TableClient;
use crate::error::{Result, TableError};
use crate::item::{ItemKey, ScanCursor, ScanPage, TableItem};

/// Durable local table backed by a single SQLite file in WAL mode.
///
/// The schema mirrors the logical table: `(id, seq)` primary key, a binary
/// data attribute, metadata columns populated on the primary chunk, and an
/// index over `(expiry_partition, expiry_timestamp)` backing the reaper's
/// partition queries. Opening provisions the schema, so the table is ready
/// for use immediately.
pub struct SqliteTable {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTable").finish_non_exhaustive()
    }
}

impl SqliteTable {
    /// Open or create a table at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|_| {
                    TableError::Database(rusqlite::Error::InvalidPath(path.to_path_buf()))
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let table = Self {
            conn: Mutex::new(conn),
        };
        table.initialize()?;

        info!("Session table opened at {:?}", path);
        Ok(table)
    }

    /// Create an in-memory table (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let table = Self {
            conn: Mutex::new(conn),
        };
        table.initialize()?;
        Ok(table)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS session_items (
                id               TEXT    NOT NULL,
                seq              INTEGER NOT NULL,
                data             BLOB    NOT NULL,
                created_at       INTEGER,
                last_updated_at  INTEGER,
                expiry_partition TEXT,
                expiry_timestamp INTEGER,
                PRIMARY KEY (id, seq)
            );
            CREATE INDEX IF NOT EXISTS expired
                ON session_items (expiry_partition, expiry_timestamp);
            "#,
        )?;

        Ok(())
    }

    fn row_to_item(row: &rusqlite::Row) -> Result<TableItem> {
        let data: Vec<u8> = row.get(2)?;
        Ok(TableItem {
            id: row.get(0)?,
            seq: row.get(1)?,
            data: Bytes::from(data),
            created_at: row.get(3)?,
            last_updated_at: row.get(4)?,
            expiry_partition: row.get(5)?,
            expiry_timestamp: row.get(6)?,
        })
    }
}

const ITEM_COLUMNS: &str =
    "id, seq, data, created_at, last_updated_at, expiry_partition, expiry_timestamp";

#[async_trait]
impl TableClient for SqliteTable {
    async fn get_item(&self, key: &ItemKey, _consistent: bool) -> Result<Option<TableItem>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM session_items WHERE id = ?1 AND seq = ?2"
        ))?;
        let mut rows = stmt.query(params![key.id, key.seq])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_item(row)?)),
            None => Ok(None),
        }
    }

    async fn put_item(&self, item: TableItem) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT OR REPLACE INTO session_items
                (id, seq, data, created_at, last_updated_at, expiry_partition, expiry_timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                item.id,
                item.seq,
                item.data.as_ref(),
                item.created_at,
                item.last_updated_at,
                item.expiry_partition,
                item.expiry_timestamp,
            ],
        )?;

        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM session_items WHERE id = ?1 AND seq = ?2",
            params![key.id, key.seq],
        )?;
        Ok(())
    }

    async fn scan(&self, cursor: Option<ScanCursor>, limit: usize) -> Result<ScanPage> {
        let (after_id, after_seq) = match cursor {
            Some(cursor) => cursor.decode()?,
            None => (String::new(), 0),
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM session_items
            WHERE id > ?1 OR (id = ?1 AND seq > ?2)
            ORDER BY id, seq
            LIMIT ?3
            "#
        ))?;
        let mut rows = stmt.query(params![after_id, after_seq, limit as i64])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(Self::row_to_item(row)?);
        }

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
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM session_items
            WHERE expiry_partition = ?1
            ORDER BY expiry_timestamp ASC
            "#
        ))?;
        let mut rows = stmt.query(params![partition])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(Self::row_to_item(row)?);
        }
        Ok(items)
    }

    async fn approximate_item_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM session_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, seq: u32, data: &[u8]) -> TableItem {
        TableItem::chunk(id, seq, Bytes::copy_from_slice(data))
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let table = SqliteTable::open_in_memory().unwrap();

        let mut primary = item("sess", 1, b"chunk-one");
        primary.created_at = Some(1000);
        primary.last_updated_at = Some(2000);
        primary.expiry_partition = Some("2026-08-06".to_string());
        primary.expiry_timestamp = Some(5000);
        table.put_item(primary.clone()).await.unwrap();

        let fetched = table
            .get_item(&ItemKey::primary("sess"), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, primary);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let table = SqliteTable::open_in_memory().unwrap();
        assert_eq!(
            table.get_item(&ItemKey::primary("nope"), false).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let table = SqliteTable::open_in_memory().unwrap();
        table.put_item(item("a", 1, b"x")).await.unwrap();

        table.delete_item(&ItemKey::primary("a")).await.unwrap();
        table.delete_item(&ItemKey::primary("a")).await.unwrap();
        assert_eq!(table.approximate_item_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scan_follows_cursor_across_chunks() {
        let table = SqliteTable::open_in_memory().unwrap();
        for i in 0..5 {
            table.put_item(item("multi", i + 1, b"c")).await.unwrap();
        }
        table.put_item(item("other", 1, b"c")).await.unwrap();

        let mut total = 0;
        let mut cursor = None;
        loop {
            let page = table.scan(cursor, 2).await.unwrap();
            total += page.items.len();
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(total, 6);
    }

    #[tokio::test]
    async fn test_expiry_index_orders_by_timestamp() {
        let table = SqliteTable::open_in_memory().unwrap();

        let mut late = item("late", 1, b"x");
        late.expiry_partition = Some("2026-08-06".to_string());
        late.expiry_timestamp = Some(900);
        table.put_item(late).await.unwrap();

        let mut early = item("early", 1, b"x");
        early.expiry_partition = Some("2026-08-06".to_string());
        early.expiry_timestamp = Some(100);
        table.put_item(early).await.unwrap();

        let found = table.query_expiry_index("2026-08-06").await.unwrap();
        assert_eq!(
            found.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["early", "late"]
        );
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");

        {
            let table = SqliteTable::open(&path).unwrap();
            table.put_item(item("persisted", 1, b"x")).await.unwrap();
        }

        let reopened = SqliteTable::open(&path).unwrap();
        assert!(reopened
            .get_item(&ItemKey::primary("persisted"), false)
            .await
            .unwrap()
            .is_some());
    }
}
