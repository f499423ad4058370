//! Error types for tree construction, diffing and synchronization.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for all suitesync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A node failed a structural invariant (e.g. a case without a name).
    /// Always raised before any remote mutation occurs.
    #[error("validation error: {0}")]
    Validation(String),

    /// A local source file could not be parsed.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Missing or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The remote service rejected or failed a call.
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised by the remote service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport-level failure (connection, TLS, timeout at the HTTP layer).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with an error envelope.
    #[error("service rejected request ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The service answered with a body we could not interpret.
    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// Whether this failure means the intended state already matches the
    /// remote state. Such rejections are recovered as success by the apply
    /// driver. The structured error code wins when the service provides one;
    /// the message substring is kept as a fallback for older API responses.
    pub fn is_no_change(&self) -> bool {
        match self {
            ServiceError::Rejected { code, message, .. } => {
                if let Some(code) = code {
                    return code == "no_changes";
                }
                message.contains("There are no changes")
            }
            _ => false,
        }
    }
}
