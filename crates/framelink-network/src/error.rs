use std::net::SocketAddr;
use thiserror::Error;

/// Errors returned by client and server endpoint operations.
///
/// Errors on an individual connection after it is established never surface
/// here: they close that connection and are only logged.
#[derive(Debug, Error)]
pub enum NetError {
    /// Host name did not resolve to any address
    #[error("Could not resolve {0}")]
    Resolve(String),

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectTimeout(u64),

    /// Failed to bind the listening socket
    #[error("Failed to bind to {0}")]
    BindFailed(SocketAddr),

    /// Endpoint is already started
    #[error("Endpoint already running")]
    AlreadyRunning,

    /// Endpoint has not been started
    #[error("Endpoint not running")]
    NotRunning,

    /// Failed to build the background I/O runtime
    #[error("Runtime error: {0}")]
    Runtime(std::io::Error),

    /// Protocol-level error
    #[error("Protocol error: {0}")]
    Protocol(#[from] framelink_core::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
