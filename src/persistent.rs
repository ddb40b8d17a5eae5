//! Bucketed key/value store that survives across invocations.
//!
//! The only bucket the engine writes is [`SCRIPT_BUCKET`], mapping a script's
//! target name to the SHA-256 of the body that last ran.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context as _, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension as _, params};

/// Bucket used for run-once script bookkeeping.
pub const SCRIPT_BUCKET: &str = "script";

/// A bucketed key/value store.
pub trait PersistentState: fmt::Debug {
    /// Return the value stored under `bucket`/`key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `bucket`/`key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is read-only or cannot be written.
    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `bucket`/`key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is read-only or cannot be written.
    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()>;
}

/// SQLite-backed store with a single `(bucket, key, value)` table.
pub struct SqlitePersistentState {
    conn: Connection,
}

impl fmt::Debug for SqlitePersistentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePersistentState")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqlitePersistentState {
    /// Open or create the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open state at {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open the store at `path` without write access.
    ///
    /// A missing file behaves as an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be opened.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("{}: no state file, using an empty store", path.display());
            let conn = Connection::open_in_memory().context("failed to open in-memory state")?;
            init_schema(&conn)?;
            conn.pragma_update(None, "query_only", "ON")
                .context("failed to make state read-only")?;
            return Ok(Self { conn });
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open state at {}", path.display()))?;
        Ok(Self { conn })
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS state (
            bucket TEXT NOT NULL,
            key BLOB NOT NULL,
            value BLOB NOT NULL,
            PRIMARY KEY(bucket, key)
        );
        ",
    )
    .context("failed to initialize state schema")
}

impl PersistentState for SqlitePersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let result = self
            .conn
            .query_row(
                "SELECT value FROM state WHERE bucket = ?1 AND key = ?2",
                params![bucket, key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional();
        match result {
            Ok(value) => Ok(value),
            // A store opened read-only before the schema existed has no table.
            Err(rusqlite::Error::SqliteFailure(_, Some(ref msg)))
                if msg.starts_with("no such table") =>
            {
                Ok(None)
            }
            Err(err) => Err(err).with_context(|| format!("failed to read {bucket} state")),
        }
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO state (bucket, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(bucket, key) DO UPDATE SET value = excluded.value",
                params![bucket, key, value],
            )
            .with_context(|| format!("failed to write {bucket} state"))?;
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM state WHERE bucket = ?1 AND key = ?2",
                params![bucket, key],
            )
            .with_context(|| format!("failed to delete {bucket} state"))?;
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryPersistentState {
    buckets: RefCell<BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryPersistentState {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentState for MemoryPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .buckets
            .borrow()
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned())
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.buckets
            .borrow_mut()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        if let Some(b) = self.buckets.borrow_mut().get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn exercise(state: &dyn PersistentState) {
        assert_eq!(state.get(SCRIPT_BUCKET, b"install.sh").unwrap(), None);
        state.set(SCRIPT_BUCKET, b"install.sh", b"h1").unwrap();
        assert_eq!(
            state.get(SCRIPT_BUCKET, b"install.sh").unwrap(),
            Some(b"h1".to_vec())
        );
        state.set(SCRIPT_BUCKET, b"install.sh", b"h2").unwrap();
        assert_eq!(
            state.get(SCRIPT_BUCKET, b"install.sh").unwrap(),
            Some(b"h2".to_vec())
        );
        assert_eq!(state.get("other", b"install.sh").unwrap(), None);
        state.delete(SCRIPT_BUCKET, b"install.sh").unwrap();
        state.delete(SCRIPT_BUCKET, b"install.sh").unwrap();
        assert_eq!(state.get(SCRIPT_BUCKET, b"install.sh").unwrap(), None);
    }

    #[test]
    fn memory_store_semantics() {
        exercise(&MemoryPersistentState::new());
    }

    #[test]
    fn sqlite_store_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        exercise(&SqlitePersistentState::open(&path).unwrap());
    }

    #[test]
    fn sqlite_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.db");
        SqlitePersistentState::open(&path)
            .unwrap()
            .set(SCRIPT_BUCKET, b"a", b"v")
            .unwrap();
        let reopened = SqlitePersistentState::open_read_only(&path).unwrap();
        assert_eq!(
            reopened.get(SCRIPT_BUCKET, b"a").unwrap(),
            Some(b"v".to_vec())
        );
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        SqlitePersistentState::open(&path).unwrap();
        let ro = SqlitePersistentState::open_read_only(&path).unwrap();
        assert!(ro.set(SCRIPT_BUCKET, b"a", b"v").is_err());
    }

    #[test]
    fn read_only_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let ro = SqlitePersistentState::open_read_only(&path).unwrap();
        assert_eq!(ro.get(SCRIPT_BUCKET, b"a").unwrap(), None);
        assert!(ro.set(SCRIPT_BUCKET, b"a", b"v").is_err());
        assert!(!path.exists());
    }
}
