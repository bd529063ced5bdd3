//! Process-local document store. Nothing survives a restart.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

use super::{check_id, Collection, DocumentStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<(Collection, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `collection`.
    pub fn count(&self, collection: Collection) -> usize {
        self.docs
            .lock()
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    /// Every document in `collection`, in no particular order.
    pub fn documents(&self, collection: Collection) -> Vec<Value> {
        self.docs
            .lock()
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        check_id(id)?;
        let mut docs = self.docs.lock();
        let key = (collection, id.to_string());
        if docs.contains_key(&key) {
            return Err(StoreError::already_exists(collection, id));
        }
        docs.insert(key, doc.clone());
        Ok(())
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Value, StoreError> {
        check_id(id)?;
        self.docs
            .lock()
            .get(&(collection, id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        check_id(id)?;
        match self.docs.lock().get_mut(&(collection, id.to_string())) {
            Some(slot) => {
                *slot = doc.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(collection, id)),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        check_id(id)?;
        self.docs
            .lock()
            .remove(&(collection, id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_read_update_delete() {
        let store = MemoryStore::new();
        store
            .create(Collection::Users, "5551234567", &json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(
            store.read(Collection::Users, "5551234567").await.unwrap(),
            json!({"a": 1})
        );

        store
            .update(Collection::Users, "5551234567", &json!({"a": 2}))
            .await
            .unwrap();
        assert_eq!(
            store.read(Collection::Users, "5551234567").await.unwrap()["a"],
            2
        );

        store.delete(Collection::Users, "5551234567").await.unwrap();
        let err = store.read(Collection::Users, "5551234567").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_refuses_existing_id() {
        let store = MemoryStore::new();
        store.create(Collection::Checks, "c1", &json!({})).await.unwrap();
        let err = store.create(Collection::Checks, "c1", &json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn collections_are_independent() {
        let store = MemoryStore::new();
        store.create(Collection::Checks, "same", &json!(1)).await.unwrap();
        store.create(Collection::Tokens, "same", &json!(2)).await.unwrap();
        assert_eq!(store.count(Collection::Checks), 1);
        assert_eq!(store.count(Collection::Tokens), 1);
        assert_eq!(store.count(Collection::Users), 0);
    }

    #[tokio::test]
    async fn update_and_delete_missing_are_not_found() {
        let store = MemoryStore::new();
        assert!(store
            .update(Collection::Tokens, "ghost", &json!({}))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store
            .delete(Collection::Tokens, "ghost")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
