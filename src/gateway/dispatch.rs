//! Path and verb resolution for the single fallback route.

use axum::http::{HeaderMap, Method};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;

use super::{ApiError, ApiResponse, AppState};
use crate::resources::{ChecksHandler, CrudHandler, TokensHandler, UsersHandler};

/// Header carrying the session token id.
pub const TOKEN_HEADER: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Post,
    Get,
    Put,
    Delete,
}

impl Verb {
    /// Case-insensitive; anything outside the four verbs is `None`.
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_lowercase().as_str() {
            "post" => Some(Self::Post),
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Post => "post",
            Self::Get => "get",
            Self::Put => "put",
            Self::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Ping,
    Users,
    Tokens,
    Checks,
}

impl Resource {
    /// Matches the path with leading and trailing slashes removed.
    pub fn parse(path: &str) -> Option<Self> {
        match trim_path(path) {
            "ping" => Some(Self::Ping),
            "users" => Some(Self::Users),
            "tokens" => Some(Self::Tokens),
            "checks" => Some(Self::Checks),
            _ => None,
        }
    }
}

pub fn trim_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Everything a handler sees of a request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub verb: Verb,
    pub token: Option<String>,
    pub query: HashMap<String, String>,
    pub payload: Value,
}

impl ApiRequest {
    pub fn new(verb: Verb, payload: Value) -> Self {
        Self {
            verb,
            token: None,
            query: HashMap::new(),
            payload,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Query parameter as a JSON string, or `Null` when absent, so it can go
    /// through the same validators as body fields.
    pub fn query_value(&self, key: &str) -> Value {
        self.query
            .get(key)
            .map_or(Value::Null, |v| Value::String(v.clone()))
    }

    pub fn payload_field(&self, key: &str) -> &Value {
        self.payload.get(key).unwrap_or(&Value::Null)
    }

    /// Query parameter first, then the body field of the same name.
    pub fn param(&self, key: &str) -> Value {
        match self.query.get(key) {
            Some(v) => Value::String(v.clone()),
            None => self.payload_field(key).clone(),
        }
    }
}

/// Token header value, ignored when blank or not valid UTF-8.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Body as JSON; empty or malformed input becomes `{}`.
pub fn parse_payload(body: &[u8]) -> Value {
    if body.is_empty() {
        return json!({});
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!("Ignoring malformed request body: {e}");
        json!({})
    })
}

pub async fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    query: HashMap<String, String>,
    payload: Value,
) -> Result<ApiResponse, ApiError> {
    let resource = Resource::parse(path).ok_or(ApiError::RouteNotFound)?;
    let verb = Verb::parse(method.as_str()).ok_or(ApiError::MethodNotAllowed)?;

    let req = ApiRequest {
        verb,
        token: token_from_headers(headers),
        query,
        payload,
    };

    match resource {
        Resource::Ping => Ok(ApiResponse::empty()),
        Resource::Users => UsersHandler.handle(state, &req).await,
        Resource::Tokens => TokensHandler.handle(state, &req).await,
        Resource::Checks => ChecksHandler.handle(state, &req).await,
    }
}
