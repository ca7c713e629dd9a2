//! Application-level errors (wraps domain and remote errors)

use thiserror::Error;

use crate::domain::{DomainError, NodeId};
use crate::infrastructure::RemoteError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("remote store: {0}")]
    Remote(#[from] RemoteError),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("no form is open")]
    NoPendingForm,

    #[error("config error: {message}")]
    Config { message: String },
}

impl ApplicationError {
    /// True when the failure came from talking to the backend.
    pub fn is_remote(&self) -> bool {
        matches!(self, ApplicationError::Remote(_))
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
