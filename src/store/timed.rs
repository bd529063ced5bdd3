//! Per-call deadline around any [`DocumentStore`].
//!
//! A stalled backend call would otherwise block its request forever. The
//! deadline only abandons the wait; whether the backend eventually applied
//! the write is unknown to the caller.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{Collection, DocumentStore, StoreError};

pub struct TimedStore {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        collection: Collection,
        id: &str,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    op,
                    collection = collection.as_str(),
                    id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl DocumentStore for TimedStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn create(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        self.bounded("create", collection, id, self.inner.create(collection, id, doc))
            .await
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Value, StoreError> {
        self.bounded("read", collection, id, self.inner.read(collection, id))
            .await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        self.bounded("update", collection, id, self.inner.update(collection, id, doc))
            .await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.bounded("delete", collection, id, self.inner.delete(collection, id))
            .await
    }
}
