//! SQLite-backed store.
//!
//! One `kv` table of BLOB keys and values. SQLite compares BLOBs with
//! `memcmp`, so a range scan over `[prefix, prefix_end(prefix))` yields keys
//! in the same order as the in-memory store.
//!
//! Schema version is stored in `PRAGMA user_version`; migrations are
//! forward-only.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::{prefix_end, Entry, KvStore, Result, StoreError};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key   BLOB PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
) WITHOUT ROWID;
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at `path`, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] or [`StoreError::Migration`].
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        configure(&conn)?;
        migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`].
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current == 0 {
        tracing::info!("Initializing store schema v{SCHEMA_VERSION}");
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    } else if current > SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "Store version {current} is newer than supported {SCHEMA_VERSION}"
        )));
    }
    Ok(())
}

impl KvStore for SqliteStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>> {
        let map_row = |row: &rusqlite::Row<'_>| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?));
        let rows = match prefix_end(prefix) {
            Some(end) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key")?;
                let rows = stmt
                    .query_map(params![prefix, end], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key")?;
                let rows = stmt
                    .query_map(params![prefix], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }
}
