//! SQLite-backed dedupe cache
//!
//! One table, `articles(id TEXT PRIMARY KEY, expiry BLOB)`, where the value
//! is an 8-byte big-endian Unix-second expiry, the only durable format this
//! crate owns. Expired rows are removed lazily: a reader that trips over a
//! stale mark deletes it on the spot, and a full cleanup scan runs at most
//! once per configured interval, gated by a double-checked timestamp so the
//! common path stays lock-free.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::StoreError;
use crate::storage::{DedupeStore, StoreOptions};

const EXPIRY_VALUE_BYTES: usize = 8;

/// Persistent TTL cache of published article ids
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    cleanup_mu: Mutex<()>,
    last_cleanup: AtomicI64,
    ttl_secs: i64,
    cleanup_interval_secs: i64,
}

impl SqliteStore {
    /// Open (and initialize) the cache database at `path`
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                expiry BLOB NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            cleanup_mu: Mutex::new(()),
            last_cleanup: AtomicI64::new(Utc::now().timestamp()),
            ttl_secs: options.article_ttl.as_secs() as i64,
            cleanup_interval_secs: options.cleanup_interval.as_secs() as i64,
        })
    }

    /// Run the expired-row scan if the cleanup interval has elapsed.
    ///
    /// Double-checked: an unsynchronized timestamp read decides whether to
    /// even take the lock; the timestamp is re-checked under the lock before
    /// scanning, so at most one caller per interval pays for the scan.
    fn maybe_cleanup(&self, now: i64) -> Result<(), StoreError> {
        if now - self.last_cleanup.load(Ordering::Relaxed) < self.cleanup_interval_secs {
            return Ok(());
        }

        let _guard = self.cleanup_mu.lock().map_err(|_| StoreError::Poisoned)?;
        if now - self.last_cleanup.load(Ordering::Relaxed) < self.cleanup_interval_secs {
            return Ok(());
        }

        {
            let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
            let conn = conn.as_ref().ok_or(StoreError::Closed)?;
            cleanup_expired(conn, now)?;
        }
        self.last_cleanup.store(now, Ordering::Relaxed);
        Ok(())
    }
}

impl DedupeStore for SqliteStore {
    fn seen_article(&self, id: &str) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp();
        self.maybe_cleanup(now)?;

        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = conn.as_ref().ok_or(StoreError::Closed)?;

        let value: Option<Vec<u8>> = conn
            .query_row("SELECT expiry FROM articles WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(value) = value else {
            return Ok(false);
        };

        match decode_expiry(&value) {
            Some(expiry) if expiry > now => Ok(true),
            // expired or undecodable marks are never resurrected
            _ => {
                conn.execute("DELETE FROM articles WHERE id = ?1", [id])?;
                Ok(false)
            }
        }
    }

    fn mark_article(&self, id: &str) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        self.maybe_cleanup(now)?;

        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = conn.as_ref().ok_or(StoreError::Closed)?;

        let expiry = encode_expiry(now + self.ttl_secs);
        conn.execute(
            "INSERT OR REPLACE INTO articles (id, expiry) VALUES (?1, ?2)",
            rusqlite::params![id, expiry.as_slice()],
        )?;
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(conn) = conn.take() {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        }
        Ok(())
    }
}

fn cleanup_expired(conn: &Connection, now: i64) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("SELECT id, expiry FROM articles")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;

    let mut expired = Vec::new();
    for row in rows {
        let (id, value) = row?;
        match decode_expiry(&value) {
            Some(expiry) if expiry > now => {}
            _ => expired.push(id),
        }
    }
    drop(stmt);

    for id in &expired {
        conn.execute("DELETE FROM articles WHERE id = ?1", [id.as_str()])?;
    }
    Ok(())
}

fn encode_expiry(unix_secs: i64) -> [u8; EXPIRY_VALUE_BYTES] {
    (unix_secs as u64).to_be_bytes()
}

/// Decode a stored expiry; wrong width or non-positive values are `None`
/// and get treated as already-expired.
fn decode_expiry(value: &[u8]) -> Option<i64> {
    let bytes: [u8; EXPIRY_VALUE_BYTES] = value.try_into().ok()?;
    let unix = u64::from_be_bytes(bytes) as i64;
    if unix <= 0 {
        return None;
    }
    Some(unix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn open_store(ttl: Duration, cleanup: Duration) -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(
            &dir.path().join("cache.db"),
            StoreOptions {
                article_ttl: ttl,
                cleanup_interval: cleanup,
            },
        )
        .unwrap();
        (store, dir)
    }

    fn row_count(store: &SqliteStore) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.as_ref()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM articles", [], |r| r.get(0))
            .unwrap()
    }

    fn put_raw(store: &SqliteStore, id: &str, value: &[u8]) {
        let conn = store.conn.lock().unwrap();
        conn.as_ref()
            .unwrap()
            .execute(
                "INSERT OR REPLACE INTO articles (id, expiry) VALUES (?1, ?2)",
                rusqlite::params![id, value],
            )
            .unwrap();
    }

    #[test]
    fn marked_article_is_seen_until_ttl_elapses() {
        let (store, _dir) = open_store(Duration::from_secs(3600), Duration::from_secs(3600));
        assert!(!store.seen_article("id1").unwrap());
        store.mark_article("id1").unwrap();
        assert!(store.seen_article("id1").unwrap());
        assert!(!store.seen_article("id2").unwrap());
    }

    #[test]
    fn expired_mark_is_deleted_on_read() {
        let (store, _dir) = open_store(Duration::from_secs(3600), Duration::from_secs(3600));
        let past = Utc::now().timestamp() - 10;
        put_raw(&store, "id1", &encode_expiry(past));

        assert!(!store.seen_article("id1").unwrap());
        assert_eq!(row_count(&store), 0, "stale read deletes the row");
    }

    #[test]
    fn undecodable_marks_are_treated_as_expired() {
        let (store, _dir) = open_store(Duration::from_secs(3600), Duration::from_secs(3600));
        put_raw(&store, "short", b"abc");
        put_raw(&store, "zero", &encode_expiry(0));

        assert!(!store.seen_article("short").unwrap());
        assert!(!store.seen_article("zero").unwrap());
        assert_eq!(row_count(&store), 0);
    }

    #[test]
    fn remark_extends_the_expiry() {
        let (store, _dir) = open_store(Duration::from_secs(3600), Duration::from_secs(3600));
        let past = Utc::now().timestamp() - 10;
        put_raw(&store, "id1", &encode_expiry(past));
        store.mark_article("id1").unwrap();
        assert!(store.seen_article("id1").unwrap());
        assert_eq!(row_count(&store), 1);
    }

    #[test]
    fn cleanup_removes_expired_rows_only_and_once_per_interval() {
        let (store, _dir) = open_store(Duration::from_secs(3600), Duration::from_secs(1));
        let now = Utc::now().timestamp();
        put_raw(&store, "old-1", &encode_expiry(now - 5));
        put_raw(&store, "old-2", &encode_expiry(now - 1));
        put_raw(&store, "garbage", b"xx");
        put_raw(&store, "fresh", &encode_expiry(now + 3600));

        // force the last-cleanup timestamp past the interval
        store.last_cleanup.store(now - 10, Ordering::Relaxed);
        assert!(!store.seen_article("probe").unwrap());

        assert_eq!(row_count(&store), 1, "only the fresh row survives");
        assert!(store.seen_article("fresh").unwrap());

        // within the same interval the timestamp does not move again
        let stamped = store.last_cleanup.load(Ordering::Relaxed);
        assert!(stamped >= now);
        assert!(!store.seen_article("probe").unwrap());
        assert_eq!(store.last_cleanup.load(Ordering::Relaxed), stamped);
    }

    #[test]
    fn end_to_end_expiry_with_forced_cleanup() {
        let (store, _dir) = open_store(Duration::from_secs(1), Duration::from_secs(1));
        store.mark_article("id1").unwrap();
        assert!(store.seen_article("id1").unwrap());

        store
            .last_cleanup
            .store(Utc::now().timestamp() - 60, Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(1100));

        assert!(!store.seen_article("id1").unwrap());
        assert_eq!(row_count(&store), 0, "record no longer exists in storage");
    }

    #[test]
    fn close_is_final() {
        let (store, _dir) = open_store(Duration::from_secs(3600), Duration::from_secs(3600));
        store.mark_article("id1").unwrap();
        store.close().unwrap();
        assert!(matches!(store.seen_article("id1"), Err(StoreError::Closed)));
        // closing twice is harmless
        store.close().unwrap();
    }
}
