use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid blob id: {0}")]
    InvalidBlobId(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unknown blob class: {0}")]
    UnknownClass(String),

    #[error("unknown route: {0}")]
    UnknownRoute(String),

    #[error("missing route parameter {param} for route {route}")]
    MissingRouteParam { route: String, param: String },
}
