//! CLI-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::infrastructure::RemoteError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),

    #[error("{count} remote write(s) failed")]
    SyncFailed { count: usize },

    #[error("tree is inconsistent: {0}")]
    Inconsistent(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Io(_) => crate::exitcode::IOERR,
            CliError::SyncFailed { .. } => crate::exitcode::UNAVAILABLE,
            CliError::Inconsistent(_) => crate::exitcode::DATAERR,
            CliError::Application(e) => match e {
                ApplicationError::Domain(_) => crate::exitcode::DATAERR,
                ApplicationError::NodeNotFound(_) => crate::exitcode::DATAERR,
                ApplicationError::NoPendingForm => crate::exitcode::SOFTWARE,
                ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                ApplicationError::Remote(RemoteError::MalformedPayload(_))
                | ApplicationError::Remote(RemoteError::Decode { .. }) => {
                    crate::exitcode::DATAERR
                }
                ApplicationError::Remote(_) => crate::exitcode::UNAVAILABLE,
            },
        }
    }
}
