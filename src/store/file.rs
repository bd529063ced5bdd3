//! Filesystem-backed document store.
//!
//! Layout: `<data_dir>/<collection>/<hex(id)>.json`, one compact JSON
//! document per file. Ids are hex-encoded so any id maps to a plain file name
//! inside its collection directory.
//!
//! Every write goes to a `.tmp-*` file first and is then linked (`create`) or
//! renamed (`update`) into place, so a failed write never leaves a truncated
//! document behind. `create` links with `hard_link`, which fails if the
//! target exists, so two racing creates for the same id cannot both succeed.
//! Everything else is last-writer-wins.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{check_id, Collection, DocumentStore, StoreError};

const TEMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (or create) a store rooted at `root`, creating one directory per
    /// collection.
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        for collection in Collection::ALL {
            let dir = root.join(collection.as_str());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create collection dir: {}", dir.display()))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn dir_for(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.as_str())
    }

    fn path_for(&self, collection: Collection, id: &str) -> Result<PathBuf, StoreError> {
        check_id(id)?;
        Ok(self
            .dir_for(collection)
            .join(format!("{}.json", hex::encode(id))))
    }

    /// Write `bytes` to a fresh temp file in `dir` and return its path.
    async fn write_temp(dir: &Path, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let tmp = dir.join(format!("{TEMP_PREFIX}{:016x}", rand::random::<u64>()));
        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)
                .await?;
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;

        match written {
            Ok(()) => Ok(tmp),
            Err(e) => {
                discard(&tmp).await;
                Err(StoreError::Io(e))
            }
        }
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!("Failed to remove temp file {}: {e}", path.display());
        }
    }
}

fn map_io(err: std::io::Error, collection: Collection, id: &str) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => StoreError::not_found(collection, id),
        ErrorKind::AlreadyExists => StoreError::already_exists(collection, id),
        _ => StoreError::Io(err),
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn create(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        let path = self.path_for(collection, id)?;
        let bytes = serde_json::to_vec(doc)?;
        let tmp = Self::write_temp(&self.dir_for(collection), &bytes).await?;
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        discard(&tmp).await;
        linked.map_err(|e| map_io(e, collection, id))
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Value, StoreError> {
        let path = self.path_for(collection, id)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| map_io(e, collection, id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        let path = self.path_for(collection, id)?;
        // Never resurrect a deleted document.
        tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io(e, collection, id))?;

        let bytes = serde_json::to_vec(doc)?;
        let tmp = Self::write_temp(&self.dir_for(collection), &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            discard(&tmp).await;
            return Err(map_io(e, collection, id));
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(collection, id)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| map_io(e, collection, id))
    }
}
