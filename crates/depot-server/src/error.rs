use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use depot_engine::{EngineError, ErrorKind};
use depot_metadata::MetadataError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<MetadataError> for ServerError {
    fn from(e: MetadataError) -> Self {
        Self::Engine(e.into())
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {e}"))
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Engine(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Integrity => StatusCode::CONFLICT,
                ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
                ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                ErrorKind::QuotaExceeded => StatusCode::INSUFFICIENT_STORAGE,
                ErrorKind::Configuration | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let kind = match &self {
            Self::Engine(e) => json!(e.kind()),
            Self::BadRequest(_) => json!("invalid_request"),
            _ => json!("internal"),
        };
        (status, Json(json!({ "error": self.to_string(), "kind": kind }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
