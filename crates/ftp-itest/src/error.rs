//! Error types for the FTP client

use thiserror::Error;

/// Errors produced by [`crate::FtpClient`].
#[derive(Error, Debug)]
pub enum FtpError {
    /// Socket-level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation ran past its configured limit
    #[error("{operation} timed out")]
    Timeout { operation: String },

    /// The server answered with a code the operation does not accept
    #[error("{command} rejected with {code}: {message}")]
    UnexpectedReply {
        command: String,
        code: u16,
        message: String,
    },

    /// A reply line that is not `NNN text` / `NNN-text`
    #[error("malformed reply: {0:?}")]
    MalformedReply(String),

    /// The server closed the control connection
    #[error("control connection closed by server")]
    Closed,
}

impl FtpError {
    /// Reply code when the server rejected a command.
    pub fn code(&self) -> Option<u16> {
        match self {
            FtpError::UnexpectedReply { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for FTP operations
pub type Result<T> = std::result::Result<T, FtpError>;
