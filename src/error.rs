//! Error types for agent-delegate.

use thiserror::Error;

/// Result type for agent-delegate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for agent-delegate.
#[derive(Debug, Error)]
pub enum Error {
    /// Tool-call arguments are not valid JSON.
    #[error("malformed tool arguments: {0}")]
    MalformedArguments(String),

    /// The invoked agent's stream failed or disconnected mid-response.
    #[error("stream transport error: {0}")]
    StreamTransport(String),

    /// The invoked agent answered with a non-success status.
    #[error("agent responded with status {status}: {body}")]
    UpstreamStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// Timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// No tool registered under the requested name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::StreamTransport(err.to_string())
        }
    }
}
