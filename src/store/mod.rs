//! Flat key-value document store.
//!
//! One JSON document per `(collection, id)`. Every call touches exactly one
//! document; there is no multi-document locking and no transaction. Callers
//! that need to keep two collections consistent do so themselves (see
//! [`crate::resources::links`]).
//!
//! Backends:
//! - [`FileStore`]: `<data_dir>/<collection>/<id>.json`
//! - [`SqliteStore`]: single `documents` table
//! - [`MemoryStore`]: process-local map
//!
//! [`TimedStore`] wraps any backend with a per-call deadline.

pub mod file;
pub mod memory;
pub mod sqlite;
pub mod timed;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use timed::TimedStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{StoreBackend, StoreConfig};

/// Named logical table of documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Tokens,
    Checks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Users, Self::Tokens, Self::Checks];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Tokens => "tokens",
            Self::Checks => "checks",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("{collection}/{id} already exists")]
    AlreadyExists { collection: Collection, id: String },

    #[error("invalid document id {0:?}")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: &str) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    pub fn already_exists(collection: Collection, id: &str) -> Self {
        Self::AlreadyExists {
            collection,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the id does not name a stored document, either because it
    /// is missing or because it could never have been stored.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidId(_))
    }
}

/// Longest id any backend accepts, in bytes. The file backend hex-encodes
/// ids, so this keeps `<hex>.json` within a 255-byte file name.
pub const MAX_ID_LEN: usize = 120;

/// Ids are opaque: any non-empty string up to [`MAX_ID_LEN`] bytes. Backends
/// that need a restricted alphabet encode the id themselves.
pub fn check_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        Err(StoreError::InvalidId(id.to_string()))
    } else {
        Ok(())
    }
}

/// Single-document CRUD over named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Write a new document. Fails with `AlreadyExists` if the id is taken.
    async fn create(&self, collection: Collection, id: &str, doc: &Value) -> Result<(), StoreError>;

    async fn read(&self, collection: Collection, id: &str) -> Result<Value, StoreError>;

    /// Replace an existing document. Fails with `NotFound` if absent.
    async fn update(&self, collection: Collection, id: &str, doc: &Value) -> Result<(), StoreError>;

    /// Remove a document. Fails with `NotFound` if absent.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
}

/// Typed helpers over [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn create_as<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(doc)?;
        self.create(collection, id, &value).await
    }

    async fn read_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<T, StoreError> {
        let value = self.read(collection, id).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn update_as<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(doc)?;
        self.update(collection, id, &value).await
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// Open the configured backend, wrapped with the configured per-call timeout.
pub fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let backend: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::File => Arc::new(FileStore::open(&config.data_dir)?),
        StoreBackend::Sqlite => {
            std::fs::create_dir_all(&config.data_dir)?;
            Arc::new(SqliteStore::open(&config.data_dir.join("documents.db"))?)
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    tracing::info!(
        backend = backend.name(),
        data_dir = %config.data_dir.display(),
        "Document store opened"
    );

    Ok(match config.op_timeout_ms {
        Some(ms) => Arc::new(TimedStore::new(backend, Duration::from_millis(ms))),
        None => backend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collection_names() {
        let names: Vec<_> = Collection::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, ["users", "tokens", "checks"]);
    }

    #[test]
    fn ids_are_opaque_but_bounded() {
        assert!(check_id("5551234567").is_ok());
        assert!(check_id("+155512345").is_ok());
        assert!(check_id("(555) 12345").is_ok());
        assert!(check_id("../etc/passwd").is_ok());
        assert!(check_id("").is_err());
        assert!(check_id(&"a".repeat(MAX_ID_LEN)).is_ok());
        assert!(check_id(&"a".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn typed_helpers_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Doc {
            n: u32,
        }

        let store = MemoryStore::new();
        store.create_as(Collection::Tokens, "t1", &Doc { n: 1 }).await.unwrap();
        store.update_as(Collection::Tokens, "t1", &Doc { n: 2 }).await.unwrap();
        let doc: Doc = store.read_as(Collection::Tokens, "t1").await.unwrap();
        assert_eq!(doc, Doc { n: 2 });
    }

    #[tokio::test]
    async fn read_as_reports_malformed_documents() {
        let store = MemoryStore::new();
        store
            .create(Collection::Tokens, "t1", &json!({"unexpected": true}))
            .await
            .unwrap();
        let err = store
            .read_as::<crate::models::Token>(Collection::Tokens, "t1")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Serde(_)));
    }

    #[test]
    fn open_memory_store_with_timeout() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            data_dir: std::path::PathBuf::from(".data"),
            op_timeout_ms: Some(250),
        };
        let store = open_store(&config).unwrap();
        assert_eq!(store.name(), "memory");
    }
}
