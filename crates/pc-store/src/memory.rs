//! In-process fragment store.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;

use pc_core::{FragmentKey, Result, SyncRecord};

use crate::FragmentStore;

/// Thread-safe store keeping everything in memory.
pub struct MemoryStore {
    fragments: DashMap<FragmentKey, Bytes>,
    sync: RwLock<Option<SyncRecord>>,
    current: RwLock<Option<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            fragments: DashMap::new(),
            sync: RwLock::new(None),
            current: RwLock::new(None),
        }
    }

    /// Number of stored fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Whether `key` has been stored.
    pub fn contains(&self, key: FragmentKey) -> bool {
        self.fragments.contains_key(&key)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FragmentStore for MemoryStore {
    async fn put(&self, key: FragmentKey, payload: Bytes) -> Result<()> {
        match self.fragments.entry(key) {
            Entry::Occupied(_) => {
                tracing::debug!(fragment = %key, "Fragment already stored, keeping first copy");
            }
            Entry::Vacant(slot) => {
                slot.insert(payload);
            }
        }
        Ok(())
    }

    async fn get(&self, key: FragmentKey) -> Result<Option<Bytes>> {
        Ok(self.fragments.get(&key).map(|entry| entry.value().clone()))
    }

    async fn put_sync(&self, sync: &SyncRecord) -> Result<()> {
        *self.sync.write() = Some(sync.clone());
        Ok(())
    }

    async fn sync(&self) -> Result<Option<SyncRecord>> {
        Ok(self.sync.read().clone())
    }

    async fn set_current(&self, number: u64) -> Result<()> {
        let mut current = self.current.write();
        if (*current).map_or(true, |existing| number > existing) {
            *current = Some(number);
        }
        Ok(())
    }

    async fn current(&self) -> Result<Option<u64>> {
        Ok(*self.current.read())
    }

    async fn clear(&self) -> Result<()> {
        self.fragments.clear();
        *self.sync.write() = None;
        *self.current.write() = None;
        Ok(())
    }
}
