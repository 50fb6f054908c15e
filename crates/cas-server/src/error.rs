use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cas_index::{IndexError, NamedError};
use cas_store::StoreError;
use cas_types::TypeError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl From<TypeError> for ServerError {
    fn from(e: TypeError) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl From<NamedError> for ServerError {
    fn from(e: NamedError) -> Self {
        match e {
            NamedError::KeyNotFound(key) => ServerError::NotFound(format!("key not found: {key}")),
            e @ NamedError::MissingBlob { .. } => ServerError::Integrity(e.to_string()),
            NamedError::Store(e) => e.into(),
            NamedError::Index(e) => e.into(),
            NamedError::Join(e) => ServerError::Internal(e.to_string()),
        }
    }
}

impl ServerError {
    /// Status code and machine-readable code for this error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::Integrity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "integrity"),
            ServerError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::Store(StoreError::Stream(_)) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Store(_) | ServerError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage")
            }
            ServerError::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index"),
            ServerError::Config(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            error!(code, error = %self, "request failed");
        } else {
            warn!(code, error = %self, "request rejected");
        }
        let body = Json(json!({ "code": code, "message": self.to_string() }));
        (status, body).into_response()
    }
}
