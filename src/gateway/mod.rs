//! Axum-based HTTP gateway with body limits and timeouts.
//!
//! All traffic goes through one fallback handler so that path trimming and
//! the 404/405 split stay under the dispatcher's control:
//! - Request body size limit (`gateway.max_body_bytes`)
//! - Request timeout (`gateway.request_timeout_secs`, answered with 408)
//! - CORS open to any origin, with the `token` header allowed
//! - Error responses produced by the layers above get the same
//!   `{"Error": ..}` JSON body as handler errors

pub mod dispatch;
pub mod error;

pub use dispatch::{ApiRequest, Resource, Verb};
pub use error::{ApiError, ApiResponse};

use crate::config::Config;
use crate::store::{self, DocumentStore};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Shared state for every request: the store and the immutable config.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Arc<Config>) -> Self {
        Self { store, config }
    }
}

/// Router with middleware, without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.gateway.max_body_bytes;
    let timeout = Duration::from_secs(state.config.gateway.request_timeout_secs);

    // ── CORS: any origin may call the API ──
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static(dispatch::TOKEN_HEADER),
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .fallback(handle_request)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(middleware::map_response(json_error_bodies))
}

/// Give non-JSON error responses (body limit, timeout) an `{"Error": ..}`
/// body.
async fn json_error_bodies(response: Response) -> Response {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if is_json || !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let reason = status.canonical_reason().unwrap_or("Request failed");
    (status, Json(serde_json::json!({ "Error": reason }))).into_response()
}

/// Open the configured store and serve until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let store = store::open_store(&config.store)?;

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let actual = listener.local_addr()?;

    tracing::info!(
        "The server is listening on {actual} in {} mode (store: {})",
        config.env_name,
        store.name()
    );

    let app = build_router(AppState::new(store, Arc::new(config)));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLER
// ══════════════════════════════════════════════════════════════════════════════

async fn handle_request(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query = Query::<HashMap<String, String>>::try_from_uri(&uri)
        .map(|Query(q)| q)
        .unwrap_or_default();
    let payload = dispatch::parse_payload(&body);

    let result = dispatch::route(&state, &method, uri.path(), &headers, query, payload).await;
    let status = match &result {
        Ok(resp) => resp.status,
        Err(err) => err.status(),
    };
    tracing::debug!(%method, path = uri.path(), status = status.as_u16(), "Returning response");

    match result {
        Ok(resp) => resp.into_response(),
        Err(err) => err.into_response(),
    }
}
