//! Directory-backed fragment store.
//!
//! Layout under the root directory:
//!
//! - `sync` -- sync record JSON
//! - `current` -- latest collected fragment number, decimal text
//! - `{number}/{type}` -- raw fragment payloads
//!
//! Every file is written to a `.part` sibling first and renamed into place,
//! so a reader sees either nothing or the complete file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use pc_core::{Error, FragmentKey, Result, SyncRecord};

use crate::FragmentStore;

const SYNC_FILE: &str = "sync";
const CURRENT_FILE: &str = "current";

/// Fragment store on the local filesystem.
pub struct FsStore {
    root: PathBuf,
    /// Highest pointer value written by this process.
    current: Mutex<Option<u64>>,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::store(format!("create {}", root.display()), e))?;

        let current = read_current(&root.join(CURRENT_FILE)).await?;
        tracing::debug!(root = %root.display(), current = ?current, "Opened fragment store");

        Ok(Self {
            root,
            current: Mutex::new(current),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_sync(&self) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.root.join(SYNC_FILE)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store("read sync", e)),
        }
    }

    fn fragment_path(&self, key: FragmentKey) -> PathBuf {
        self.root
            .join(key.number.to_string())
            .join(key.kind.as_str())
    }
}

#[async_trait]
impl FragmentStore for FsStore {
    async fn put(&self, key: FragmentKey, payload: Bytes) -> Result<()> {
        let path = self.fragment_path(key);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::store(format!("stat {key}"), e))?;
        if exists {
            tracing::debug!(fragment = %key, "Fragment already stored, keeping first copy");
            return Ok(());
        }

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::store(format!("create dir for {key}"), e))?;
        }
        write_atomic(&path, &payload)
            .await
            .map_err(|e| Error::store(format!("write {key}"), e))
    }

    async fn get(&self, key: FragmentKey) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.fragment_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store(format!("read {key}"), e)),
        }
    }

    async fn put_sync(&self, sync: &SyncRecord) -> Result<()> {
        let json = sync.to_json()?;
        write_atomic(&self.root.join(SYNC_FILE), &json)
            .await
            .map_err(|e| Error::store("write sync", e))
    }

    async fn sync(&self) -> Result<Option<SyncRecord>> {
        match self.read_sync().await? {
            Some(data) => parse_stored_sync(&data).map(Some),
            None => Ok(None),
        }
    }

    async fn sync_json(&self) -> Result<Option<Bytes>> {
        let Some(data) = self.read_sync().await? else {
            return Ok(None);
        };
        parse_stored_sync(&data)?;
        Ok(Some(data))
    }

    async fn set_current(&self, number: u64) -> Result<()> {
        let mut high_water = self.current.lock().await;
        if matches!(*high_water, Some(n) if n >= number) {
            return Ok(());
        }
        write_atomic(&self.root.join(CURRENT_FILE), number.to_string().as_bytes())
            .await
            .map_err(|e| Error::store("write current", e))?;
        *high_water = Some(number);
        Ok(())
    }

    async fn current(&self) -> Result<Option<u64>> {
        // Read the file rather than the in-process mark: the collector may be
        // a different process.
        read_current(&self.root.join(CURRENT_FILE)).await
    }

    async fn clear(&self) -> Result<()> {
        let mut high_water = self.current.lock().await;
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => tracing::info!(root = %self.root.display(), "Existing stream folder emptied"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::store(format!("clear {}", self.root.display()), e)),
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::store(format!("create {}", self.root.display()), e))?;
        *high_water = None;
        Ok(())
    }
}

fn parse_stored_sync(data: &[u8]) -> Result<SyncRecord> {
    SyncRecord::from_json(data)
        .map_err(|e| Error::Internal(format!("stored sync record is unreadable: {e}")))
}

async fn read_current(path: &Path) -> Result<Option<u64>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::store("read current", e)),
    };
    let text = text.trim();
    text.parse::<u64>().map(Some).map_err(|e| {
        Error::Internal(format!("current pointer '{text}' is unreadable: {e}"))
    })
}

async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    tokio::fs::write(&part, data).await?;
    tokio::fs::rename(&part, path).await
}
