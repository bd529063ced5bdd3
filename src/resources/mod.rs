//! Resource handlers for `users`, `tokens` and `checks`.
//!
//! Each handler is a strictly sequential chain of single-document store
//! calls. Every store result is inspected before the next call is issued,
//! and every path ends in exactly one `ApiResponse` or `ApiError`.

pub mod checks;
pub mod links;
pub mod tokens;
pub mod users;

pub use checks::ChecksHandler;
pub use tokens::TokensHandler;
pub use users::UsersHandler;

use async_trait::async_trait;

use crate::gateway::{ApiError, ApiRequest, ApiResponse, AppState, Verb};
use crate::store::StoreError;

pub type ApiResult = Result<ApiResponse, ApiError>;

/// Uniform CRUD surface every resource exposes to the dispatcher.
#[async_trait]
pub trait CrudHandler: Send + Sync {
    async fn post(&self, state: &AppState, req: &ApiRequest) -> ApiResult;
    async fn get(&self, state: &AppState, req: &ApiRequest) -> ApiResult;
    async fn put(&self, state: &AppState, req: &ApiRequest) -> ApiResult;
    async fn delete(&self, state: &AppState, req: &ApiRequest) -> ApiResult;

    async fn handle(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        match req.verb {
            Verb::Post => self.post(state, req).await,
            Verb::Get => self.get(state, req).await,
            Verb::Put => self.put(state, req).await,
            Verb::Delete => self.delete(state, req).await,
        }
    }
}

/// Log a store failure and turn it into a 500 with `message`.
pub(crate) fn store_failure(err: StoreError, message: &'static str) -> ApiError {
    tracing::error!("{message}: {err}");
    ApiError::Store(message)
}

/// A failed read of a caller-named record: absent ids map to `missing`,
/// anything else is a store failure.
pub(crate) fn read_failure(err: StoreError, missing: ApiError, message: &'static str) -> ApiError {
    if err.is_absent() {
        missing
    } else {
        store_failure(err, message)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for handler tests.

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::{CrudHandler, TokensHandler, UsersHandler};
    use crate::config::Config;
    use crate::gateway::{ApiRequest, AppState, Verb};
    use crate::store::{Collection, DocumentStore, MemoryStore, StoreError};

    pub const PHONE: &str = "5551234567";
    pub const PASSWORD: &str = "secret1";

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Op {
        Create,
        Read,
        Update,
        Delete,
    }

    /// Wraps a [`MemoryStore`] and fails chosen `(op, collection)` pairs,
    /// or chosen ids, with a backend error.
    #[derive(Default)]
    pub struct FaultyStore {
        pub inner: MemoryStore,
        failing: Mutex<HashSet<(Op, Collection)>>,
        failing_ids: Mutex<HashSet<(Op, String)>>,
    }

    impl FaultyStore {
        pub fn fail(&self, op: Op, collection: Collection) {
            self.failing.lock().insert((op, collection));
        }

        pub fn fail_id(&self, op: Op, id: &str) {
            self.failing_ids.lock().insert((op, id.to_string()));
        }

        pub fn heal(&self) {
            self.failing.lock().clear();
            self.failing_ids.lock().clear();
        }

        fn check(&self, op: Op, collection: Collection, id: &str) -> Result<(), StoreError> {
            let hit = self.failing.lock().contains(&(op, collection))
                || self.failing_ids.lock().contains(&(op, id.to_string()));
            if hit {
                Err(StoreError::Backend(format!("injected {op:?} failure")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FaultyStore {
        fn name(&self) -> &str {
            "faulty"
        }

        async fn create(&self, c: Collection, id: &str, doc: &Value) -> Result<(), StoreError> {
            self.check(Op::Create, c, id)?;
            self.inner.create(c, id, doc).await
        }

        async fn read(&self, c: Collection, id: &str) -> Result<Value, StoreError> {
            self.check(Op::Read, c, id)?;
            self.inner.read(c, id).await
        }

        async fn update(&self, c: Collection, id: &str, doc: &Value) -> Result<(), StoreError> {
            self.check(Op::Update, c, id)?;
            self.inner.update(c, id, doc).await
        }

        async fn delete(&self, c: Collection, id: &str) -> Result<(), StoreError> {
            self.check(Op::Delete, c, id)?;
            self.inner.delete(c, id).await
        }
    }

    pub fn state_with(store: Arc<dyn DocumentStore>) -> AppState {
        AppState::new(store, Arc::new(Config::staging()))
    }

    pub fn faulty_state() -> (Arc<FaultyStore>, AppState) {
        let store = Arc::new(FaultyStore::default());
        let state = state_with(store.clone());
        (store, state)
    }

    pub fn request(verb: Verb, payload: Value) -> ApiRequest {
        ApiRequest::new(verb, payload)
    }

    pub fn user_payload(phone: &str) -> Value {
        json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "phone": phone,
            "password": PASSWORD,
            "tosAgreement": true
        })
    }

    pub fn check_payload() -> Value {
        json!({
            "protocol": "https",
            "url": "example.com",
            "method": "get",
            "successCodes": [200, 201],
            "timeoutSeconds": 3
        })
    }

    /// Register the user at [`PHONE`].
    pub async fn signup(state: &AppState) {
        UsersHandler
            .handle(state, &request(Verb::Post, user_payload(PHONE)))
            .await
            .unwrap();
    }

    /// Log in as [`PHONE`] and return the token id.
    pub async fn login(state: &AppState) -> String {
        let resp = TokensHandler
            .handle(
                state,
                &request(Verb::Post, json!({"phone": PHONE, "password": PASSWORD})),
            )
            .await
            .unwrap();
        resp.body["id"].as_str().unwrap().to_string()
    }
}
