use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::{prefix_upper_bound, DurableStore, ListRange};

/// Durable store backed by a single SQLite file.
///
/// Keys live in one ordered `kv` table; the wake register is a one-row
/// `wake` table so it survives restarts alongside the task records. The
/// connection is wrapped in a `Mutex` — the host serializes all operations
/// against a partition, so contention is not a concern here.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

/// Initialise the store schema in `conn`. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            key    TEXT NOT NULL PRIMARY KEY,
            value  TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS wake (
            id     INTEGER PRIMARY KEY CHECK (id = 0),
            at_ms  INTEGER
        ) STRICT;
        ",
    )?;
    Ok(())
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database. Handy for tests that want SQLite
    /// semantics without touching disk.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let db = self.db.lock().unwrap();
        match db.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
            row.get::<_, String>(0)
        }) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let raw = serde_json::to_string(&value)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, raw],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(n > 0)
    }

    async fn list(&self, range: ListRange) -> Result<Vec<(String, Value)>> {
        // Fold the prefix into [start, end) bounds so a single static query
        // covers every combination of range options.
        let mut start = range.start.unwrap_or_default();
        let mut end = range.end;
        if let Some(ref prefix) = range.prefix {
            if start.as_str() < prefix.as_str() {
                start = prefix.clone();
            }
            let upper = prefix_upper_bound(prefix);
            end = Some(match end {
                Some(e) if e.as_str() < upper.as_str() => e,
                _ => upper,
            });
        }
        let limit = range.limit.map(|n| n as i64).unwrap_or(-1);

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(
            "SELECT key, value FROM kv
             WHERE key >= ?1 AND (?2 IS NULL OR key < ?2)
             ORDER BY key
             LIMIT ?3",
        )?;
        let rows: Vec<(String, String)> = stmt
            .query_map(rusqlite::params![start, end, limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);
        drop(db);

        let mut out = Vec::with_capacity(rows.len());
        for (key, raw) in rows {
            out.push((key, serde_json::from_str(&raw)?));
        }
        Ok(out)
    }

    async fn set_wake(&self, at_ms: Option<i64>) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO wake (id, at_ms) VALUES (0, ?1)
             ON CONFLICT(id) DO UPDATE SET at_ms = excluded.at_ms",
            rusqlite::params![at_ms],
        )?;
        debug!(?at_ms, "wake register persisted");
        Ok(())
    }

    async fn get_wake(&self) -> Result<Option<i64>> {
        let db = self.db.lock().unwrap();
        match db.query_row("SELECT at_ms FROM wake WHERE id = 0", [], |row| {
            row.get::<_, Option<i64>>(0)
        }) {
            Ok(at_ms) => Ok(at_ms),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }
}
