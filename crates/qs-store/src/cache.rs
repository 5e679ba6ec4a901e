//! Write-buffering overlay.
//!
//! A [`CacheStore`] reads through to its parent and buffers every write.
//! Nothing reaches the parent until [`CacheStore::commit`]; dropping the
//! overlay (or calling [`CacheStore::discard`]) throws the writes away.
//! The keeper runs each zone's epoch processing in one of these so a failing
//! zone leaves no partial state behind.

use std::collections::BTreeMap;

use crate::{Entry, KvStore, Result};

pub struct CacheStore<'a> {
    parent: &'a mut dyn KvStore,
    /// `None` marks a buffered delete.
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> CacheStore<'a> {
    pub fn new(parent: &'a mut dyn KvStore) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Number of buffered writes and deletes.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Apply the buffered writes to the parent in key order.
    ///
    /// # Errors
    ///
    /// Returns the first parent error; writes before it have been applied.
    pub fn commit(self) -> Result<()> {
        let count = self.writes.len();
        for (key, value) in self.writes {
            match value {
                Some(v) => self.parent.set(&key, &v)?,
                None => self.parent.delete(&key)?,
            }
        }
        tracing::debug!(writes = count, "cache store committed");
        Ok(())
    }

    pub fn discard(self) {
        tracing::debug!(writes = self.writes.len(), "cache store discarded");
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<Entry>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.parent.iter_prefix(prefix)?.into_iter().collect();
        for (key, value) in self
            .writes
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}
