//! SQLite-backed document store.
//!
//! Tables:
//! - `documents`: collection, id, body (JSON text), updated_at

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;

use super::{check_id, Collection, DocumentStore, StoreError};
use crate::auth::now_ms;

pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open (or create) the document database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );",
        )?;
        Ok(())
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        check_id(id)?;
        let body = serde_json::to_string(doc)?;
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![collection.as_str(), id, body, now_ms()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::already_exists(collection, id))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Value, StoreError> {
        check_id(id)?;
        let conn = self.conn.lock();
        let row: Result<String, _> = conn.query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection.as_str(), id],
            |row| row.get(0),
        );

        match row {
            Ok(body) => Ok(serde_json::from_str(&body)?),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::not_found(collection, id)),
            Err(e) => Err(backend(e)),
        }
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        check_id(id)?;
        let body = serde_json::to_string(doc)?;
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE documents SET body = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection.as_str(), id, body, now_ms()],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        check_id(id)?;
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection.as_str(), id],
            )
            .map_err(backend)?;
        if deleted == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }
}
