//! Flat-file cache store

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{CacheStore, validate_file_key};
use crate::entry::Entry;
use crate::envelope;
use crate::error::StoreError;

/// File-per-key cache store
///
/// Every entry lives in `<base_path>/<key>`, encoded as an envelope.
/// The directory is created on first use.
pub struct FileStore {
    base_path: PathBuf,
    ready: OnceCell<bool>,
}

impl FileStore {
    /// Create a file store rooted at `base_path`
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            ready: OnceCell::new(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create the base directory once; a failure sticks for the store's lifetime
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        let ready = *self
            .ready
            .get_or_init(|| async {
                match fs::create_dir_all(&self.base_path).await {
                    Ok(()) => {
                        info!("Initialized file store at {:?}", self.base_path);
                        true
                    }
                    Err(e) => {
                        warn!(
                            "Failed to create file store directory {:?}: {}",
                            self.base_path, e
                        );
                        false
                    }
                }
            })
            .await;

        if ready {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "file store directory {:?} could not be created",
                self.base_path
            )))
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    /// Unique sibling of the entry files, independent of the key's length
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(format!(".{}.tmp", Uuid::new_v4().simple()))
    }

    /// Write an entry, replacing any previous file for the same key
    pub async fn try_put(&self, entry: &Entry) -> Result<(), StoreError> {
        validate_file_key(&entry.key)?;
        self.ensure_ready().await?;

        let path = self.entry_path(&entry.key);
        let temp_path = self.temp_path();
        debug!("Writing entry to {:?} ({} bytes)", path, entry.size());

        let data = envelope::encode(entry);

        // Write atomically using a temp file
        if let Err(e) = write_synced(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Read and decode the entry stored under `key`
    pub async fn try_get(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        validate_file_key(key)?;
        self.ensure_ready().await?;

        let path = self.entry_path(key);
        debug!("Reading entry from {:?}", path);

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut entry = envelope::decode(&data)?;
        if entry.key.is_empty() {
            entry.key = key.to_string();
        }
        Ok(Some(entry))
    }

    /// Delete the file for `key`, `Ok(false)` if it did not exist
    pub async fn try_delete(&self, key: &str) -> Result<bool, StoreError> {
        validate_file_key(key)?;
        self.ensure_ready().await?;

        let path = self.entry_path(key);
        debug!("Deleting entry at {:?}", path);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Remove everything under the base directory, returns the number of items removed
    pub async fn try_clear(&self) -> Result<u64, StoreError> {
        self.ensure_ready().await?;

        let mut dir = match fs::read_dir(&self.base_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut removed = 0u64;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let result = match item.file_type().await {
                Ok(file_type) if file_type.is_dir() => fs::remove_dir_all(&path).await,
                Ok(_) => fs::remove_file(&path).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {:?}: {}", path, e),
            }
        }

        info!("Cleared {} items from file store {:?}", removed, self.base_path);
        Ok(removed)
    }

    /// Total size of the regular files in the base directory
    pub async fn try_cost_size(&self) -> Result<u64, StoreError> {
        self.ensure_ready().await?;

        let mut dir = fs::read_dir(&self.base_path).await?;
        let mut total = 0u64;
        while let Some(item) = dir.next_entry().await? {
            let metadata = item.metadata().await?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl CacheStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn put(&self, entry: &Entry) -> bool {
        match self.try_put(entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!("File store write failed for {:?}: {}", entry.key, e);
                false
            }
        }
    }

    async fn get(&self, key: &str) -> Option<Entry> {
        match self.try_get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("File store read failed for {:?}: {}", key, e);
                None
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        match self.try_delete(key).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("File store delete failed for {:?}: {}", key, e);
                false
            }
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!("File store clear failed: {}", e);
        }
    }

    async fn cost_size(&self) -> u64 {
        match self.try_cost_size().await {
            Ok(size) => size,
            Err(e) => {
                warn!("File store cost size failed: {}", e);
                0
            }
        }
    }
}
