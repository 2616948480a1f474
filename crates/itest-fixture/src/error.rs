//! Error types for itest-fixture

use std::time::Duration;

use thiserror::Error;

/// Errors raised while provisioning or tearing down a service.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// A runtime command ran but exited unsuccessfully
    #[error("`{command}` exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// A runtime command did not finish in time
    #[error("`{command}` timed out after {secs} seconds")]
    CommandTimedOut { command: String, secs: u64 },

    /// The service never satisfied its readiness predicate
    #[error("{host}:{port} was not ready after {waited:?}")]
    ReadinessTimeout {
        host: String,
        port: u16,
        waited: Duration,
    },

    /// Spawning a command or talking to a socket failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fixture operations
pub type Result<T> = std::result::Result<T, FixtureError>;
