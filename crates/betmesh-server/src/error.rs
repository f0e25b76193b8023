//! Server error types and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use betmesh_config::ConfigError;
use betmesh_gossip::GossipError;
use betmesh_ledger::{ErrorKind, LedgerError};
use betmesh_store::StoreError;
use betmesh_types::{TypeError, Username};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving requests or starting a node.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A ledger rule refused the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A peer already holds an account with this name.
    #[error("username {0} already exists on another node")]
    TakenElsewhere(Username),

    /// Input failed validation before reaching the ledger.
    #[error(transparent)]
    InvalidInput(#[from] TypeError),

    /// The request body or path could not be understood.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The node configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Opening the record store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Gossip setup failed.
    #[error("gossip error: {0}")]
    Gossip(#[from] GossipError),

    /// Bind failed.
    #[error("failed to bind {listener} listener on {addr}: {source}")]
    BindFailed {
        listener: &'static str,
        addr: String,
        source: std::io::Error,
    },

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ServerError {
    /// Category used to pick the response status.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ledger(e) => e.kind(),
            Self::TakenElsewhere(_) => ErrorKind::Conflict,
            Self::InvalidInput(_) | Self::BadRequest(_) => ErrorKind::Validation,
            Self::Config(_)
            | Self::Store(_)
            | Self::Gossip(_)
            | Self::BindFailed { .. }
            | Self::Io(_)
            | Self::Task(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
