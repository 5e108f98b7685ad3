//! pc-store: append-only storage of collected fragments.
//!
//! The collector is the only writer and the relay server the only reader.
//! Fragment keys are written at most once; the `current` pointer is the only
//! mutable scalar and it only moves forward, after the fragment it names has
//! been written.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;

use pc_core::{FragmentKey, Result, SyncRecord};

/// Storage of fragments, the sync record and the current pointer.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Store a fragment payload. An already stored key is left untouched.
    async fn put(&self, key: FragmentKey, payload: Bytes) -> Result<()>;

    /// Fetch a fragment payload, `None` if it was never stored.
    async fn get(&self, key: FragmentKey) -> Result<Option<Bytes>>;

    /// Persist the feed's sync record.
    async fn put_sync(&self, sync: &SyncRecord) -> Result<()>;

    /// The persisted sync record, `None` before bootstrap.
    async fn sync(&self) -> Result<Option<SyncRecord>>;

    /// The persisted sync record as stored JSON bytes.
    ///
    /// Stores that keep the serialized form return it unchanged.
    async fn sync_json(&self) -> Result<Option<Bytes>> {
        match self.sync().await? {
            Some(sync) => Ok(Some(Bytes::from(sync.to_json()?))),
            None => Ok(None),
        }
    }

    /// Advance the current pointer. Never moves it backwards.
    async fn set_current(&self, number: u64) -> Result<()>;

    /// Latest fully collected fragment number, `None` before the first one.
    async fn current(&self) -> Result<Option<u64>>;

    /// Drop everything stored so far.
    async fn clear(&self) -> Result<()>;
}
