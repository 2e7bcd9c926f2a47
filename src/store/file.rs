use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{KeyValueStore, StoreError, StoreResult};

/// All keys in one JSON object on disk. Every mutation rewrites the file
/// through a temp file + rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open or create. An unreadable document is an error; a missing file
    /// starts empty.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
                key: path.display().to_string(),
                reason: e.to_string(),
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "file store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let payload = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.flush(&entries).await
    }
}
