use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::resources::links::ReconciliationTask;

/// Every failure a request can end in. Bodies are `{"Error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(&'static str),

    /// Users `PUT` reports bad input and unknown users as 404.
    #[error("{0}")]
    InvalidUpdate(&'static str),

    /// Token rejected on a users route.
    #[error("Invalid or expired token")]
    Unauthorized,

    /// Token rejected on a checks route.
    #[error("Missing required token in header, or token is invalid")]
    Forbidden,

    /// Caller named a record that does not exist. Reported as 400.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("The user already has the maximum number of checks ({max})")]
    QuotaExceeded { max: usize },

    #[error("{0}")]
    Store(&'static str),

    /// Some writes of a multi-document operation did not happen.
    #[error("{message}")]
    PartialFailure {
        message: String,
        reconciliation: Vec<ReconciliationTask>,
    },

    #[error("Not found")]
    RouteNotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Unauthorized
            | Self::NotFound(_)
            | Self::QuotaExceeded { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidUpdate(_) | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Store(_) | Self::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            Self::PartialFailure { reconciliation, .. } => json!({
                "Error": self.to_string(),
                "reconciliation": reconciliation,
            }),
            _ => json!({ "Error": self.to_string() }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// A successful response: status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// 200 with `{}`.
    pub fn empty() -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({}),
        }
    }

    /// 200 with `value` serialized as the body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_value(value).map_err(|e| {
            tracing::error!("Failed to serialize response body: {e}");
            ApiError::Store("Could not encode the response")
        })?;
        Ok(Self {
            status: StatusCode::OK,
            body,
        })
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
