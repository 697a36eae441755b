//! Error types for the private DNS engine.

use crate::server::NetId;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the private DNS engine
///
/// The `request_validation` preconditions each map to their own variant so
/// callers can tell the rejection reasons apart.
#[derive(Error, Debug)]
pub enum Error {
    /// A server address passed to `set` did not parse as a numeric host.
    /// The whole call is rejected; no state is mutated.
    #[error("invalid server address: {0}")]
    InvalidServer(String),

    /// Engine or backoff configuration failed validation
    #[error("configuration error: {0}")]
    Config(String),

    /// The engine was constructed outside a Tokio runtime
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Revalidation was requested for a network with no private DNS mode
    #[error("netId {0} has no private DNS configuration")]
    UnknownNetwork(NetId),

    /// Revalidation was requested on a network whose mode is not opportunistic
    #[error("private DNS setting on netId {0} is not opportunistic")]
    NotOpportunistic(NetId),

    /// Revalidation was requested for a server that is not tracked
    #[error("server {0} not found")]
    ServerNotFound(String),

    /// Revalidation was requested for a server absent from the current
    /// desired configuration
    #[error("server {0} is not active")]
    ServerInactive(String),

    /// Revalidation was requested for a server whose validation state is not
    /// `Success`
    #[error("server {0} validation state mismatched")]
    StateMismatch(String),

    /// Revalidation was requested with a socket mark that does not match the
    /// one captured at configuration time
    #[error("socket mark mismatched for server {0}")]
    MarkMismatch(String),

    /// Internal lookup failure; never escapes the public API
    #[error("not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid-server error
    pub fn invalid_server(msg: impl Into<String>) -> Self {
        Self::InvalidServer(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
