//! Error types for the naming core

/// Naming server error type
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("storage node already registered: {0}")]
    DuplicateRegistration(String),
    #[error("command to storage node {node} failed: {reason}")]
    RemoteCommand { node: String, reason: String },
    #[error("no storage nodes registered")]
    NoStorageNodes,
    #[error("timed out waiting for lock on {0}")]
    LockTimeout(String),
}

impl Error {
    /// Create a remote command failure for the given storage node.
    pub fn remote<N: ToString, R: Into<String>>(node: N, reason: R) -> Self {
        Self::RemoteCommand {
            node: node.to_string(),
            reason: reason.into(),
        }
    }
}

pub type NamingResult<T> = Result<T, Error>;
