//! # qs-store
//!
//! Ordered byte-keyed storage for module state.
//!
//! All module state lives behind the [`KvStore`] trait: protocol data,
//! claims and archived claims share one keyspace separated by prefix bytes.
//!
//! ## Modules
//!
//! - [`memory`] - in-memory store for tests and simulation
//! - [`cache`] - write-buffering overlay with commit/discard
//! - [`sqlite`] - persistent store on SQLite (WAL mode)

pub mod cache;
pub mod memory;
pub mod sqlite;

pub use cache::CacheStore;
pub use memory::MemStore;
pub use sqlite::SqliteStore;

/// Store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A key/value pair returned from a prefix scan.
pub type Entry = (Vec<u8>, Vec<u8>);

/// Ordered key/value storage.
///
/// Prefix scans return entries in ascending byte order of their keys.
pub trait KvStore {
    /// # Errors
    ///
    /// Returns a backend error.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// # Errors
    ///
    /// Returns a backend error.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// # Errors
    ///
    /// Returns a backend error.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>>;

    /// # Errors
    ///
    /// Returns a backend error.
    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<T: KvStore + ?Sized> KvStore for &mut T {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>> {
        (**self).iter_prefix(prefix)
    }
}

impl<T: KvStore + ?Sized> KvStore for Box<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>> {
        (**self).iter_prefix(prefix)
    }
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// when no such key exists (empty or all-`0xff` prefix).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(&[0x01, 0x02]), Some(vec![0x01, 0x03]));
        assert_eq!(prefix_end(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(&[]), None);
    }

    fn write_through(mut store: impl KvStore) {
        store.set(b"k", b"v").expect("set");
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut mem = MemStore::new();
        write_through(&mut mem);
        assert!(mem.has(b"k").expect("has"));

        let mut boxed: Box<dyn KvStore> = Box::new(MemStore::new());
        write_through(&mut boxed);
        assert!(boxed.has(b"k").expect("has"));
    }
}
