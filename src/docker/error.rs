//! Error types for the Docker runtime.

use bollard::errors::Error as BollardError;
use thiserror::Error;

const HTTP_NOT_MODIFIED: u16 = 304;
const HTTP_NOT_FOUND: u16 = 404;
const HTTP_CONFLICT: u16 = 409;

/// Errors raised by [`super::DockerRuntime`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DockerRuntimeError {
    /// Raised when a client for the daemon cannot be constructed.
    #[error("failed to connect to Docker at {host}: {message}")]
    Connect {
        /// Host that was dialled, or `local defaults`.
        host: String,
        /// Message returned by the client.
        message: String,
    },
    /// Raised when the daemon does not know the container or image.
    #[error("not found: {message}")]
    NotFound {
        /// Message returned by the daemon.
        message: String,
    },
    /// Raised when the request clashes with existing state, such as a name
    /// already in use.
    #[error("conflict: {message}")]
    Conflict {
        /// Message returned by the daemon.
        message: String,
    },
    /// Raised when the container is already in the requested state.
    #[error("container already in requested state: {message}")]
    NotModified {
        /// Message returned by the daemon, often empty.
        message: String,
    },
    /// Raised for any other status code returned by the daemon.
    #[error("Docker API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message returned by the daemon.
        message: String,
    },
    /// Raised when the request never produced a daemon response.
    #[error("Docker transport error: {message}")]
    Transport {
        /// Client level error description.
        message: String,
    },
}

impl From<BollardError> for DockerRuntimeError {
    fn from(value: BollardError) -> Self {
        match value {
            BollardError::DockerResponseServerError {
                status_code,
                message,
            } => match status_code {
                HTTP_NOT_FOUND => Self::NotFound { message },
                HTTP_CONFLICT => Self::Conflict { message },
                HTTP_NOT_MODIFIED => Self::NotModified { message },
                status => Self::Api { status, message },
            },
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}
