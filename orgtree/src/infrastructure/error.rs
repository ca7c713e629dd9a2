//! Infrastructure-level errors (remote store transport and payloads)

use thiserror::Error;

/// Errors raised while talking to the remote tree service.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request failed: {context}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned HTTP {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("decode failed: {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Create a transport error with context.
    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    /// Create a decode error with context.
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    /// Whether another attempt could succeed.
    ///
    /// Client errors (4xx) and bad payloads are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport { .. } | RemoteError::Unavailable(_) => true,
            RemoteError::Status { status, .. } => *status >= 500,
            RemoteError::MalformedPayload(_) | RemoteError::Decode { .. } => false,
        }
    }
}

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
