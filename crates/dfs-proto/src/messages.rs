//! Naming protocol and storage command message types

use dfs_core::{Error, LockMode, StorageNodeInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn root_path() -> String {
    "/".to_string()
}

/// Request sent to one of the naming server's listeners
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    IsValidPath {
        path: String,
    },
    GetStorage {
        path: String,
    },
    Delete {
        path: String,
    },
    CreateDirectory {
        path: String,
    },
    CreateFile {
        path: String,
    },
    /// Lists the root when `path` is omitted.
    List {
        #[serde(default = "root_path")]
        path: String,
    },
    IsDirectory {
        path: String,
    },
    Register(RegisterRequest),
    Lock {
        path: String,
        exclusive: bool,
    },
    Unlock {
        path: String,
        exclusive: bool,
    },
}

/// Storage node announcement, accepted on the registration listener only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub storage_ip: String,
    pub client_port: u16,
    pub command_port: u16,
    #[serde(default)]
    pub files: Vec<String>,
}

impl RegisterRequest {
    pub fn node_info(&self) -> StorageNodeInfo {
        StorageNodeInfo::new(self.storage_ip.clone(), self.client_port, self.command_port)
    }
}

impl Request {
    pub fn is_valid_path(path: impl Into<String>) -> Self {
        Request::IsValidPath { path: path.into() }
    }

    pub fn get_storage(path: impl Into<String>) -> Self {
        Request::GetStorage { path: path.into() }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Request::Delete { path: path.into() }
    }

    pub fn create_directory(path: impl Into<String>) -> Self {
        Request::CreateDirectory { path: path.into() }
    }

    pub fn create_file(path: impl Into<String>) -> Self {
        Request::CreateFile { path: path.into() }
    }

    pub fn list(path: impl Into<String>) -> Self {
        Request::List { path: path.into() }
    }

    pub fn is_directory(path: impl Into<String>) -> Self {
        Request::IsDirectory { path: path.into() }
    }

    pub fn register(node: &StorageNodeInfo, files: Vec<String>) -> Self {
        Request::Register(RegisterRequest {
            storage_ip: node.server_ip.clone(),
            client_port: node.client_port,
            command_port: node.command_port,
            files,
        })
    }

    pub fn lock(path: impl Into<String>, mode: LockMode) -> Self {
        Request::Lock {
            path: path.into(),
            exclusive: mode.is_exclusive(),
        }
    }

    pub fn unlock(path: impl Into<String>, mode: LockMode) -> Self {
        Request::Unlock {
            path: path.into(),
            exclusive: mode.is_exclusive(),
        }
    }

    /// Wire name of the operation, used in logs.
    pub fn op_name(&self) -> &'static str {
        match self {
            Request::IsValidPath { .. } => "is_valid_path",
            Request::GetStorage { .. } => "get_storage",
            Request::Delete { .. } => "delete",
            Request::CreateDirectory { .. } => "create_directory",
            Request::CreateFile { .. } => "create_file",
            Request::List { .. } => "list",
            Request::IsDirectory { .. } => "is_directory",
            Request::Register(_) => "register",
            Request::Lock { .. } => "lock",
            Request::Unlock { .. } => "unlock",
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Request::IsValidPath { path }
            | Request::GetStorage { path }
            | Request::Delete { path }
            | Request::CreateDirectory { path }
            | Request::CreateFile { path }
            | Request::List { path }
            | Request::IsDirectory { path }
            | Request::Lock { path, .. }
            | Request::Unlock { path, .. } => Some(path),
            Request::Register(_) => None,
        }
    }
}

/// Stable error identifiers carried by [`Response::Error`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    DuplicateRegistration,
    RemoteCommand,
    NoStorageNodes,
    LockTimeout,
    /// Malformed line, or an operation sent to the wrong listener.
    InvalidRequest,
}

impl From<&Error> for ErrorKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::InvalidPath(_) => ErrorKind::InvalidPath,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::NotADirectory(_) => ErrorKind::NotADirectory,
            Error::IsADirectory(_) => ErrorKind::IsADirectory,
            Error::DuplicateRegistration(_) => ErrorKind::DuplicateRegistration,
            Error::RemoteCommand { .. } => ErrorKind::RemoteCommand,
            Error::NoStorageNodes => ErrorKind::NoStorageNodes,
            Error::LockTimeout(_) => ErrorKind::LockTimeout,
        }
    }
}

/// Response to a [`Request`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Bool { success: bool },
    Storage { server_ip: String, server_port: u16 },
    Files { files: Vec<String> },
    Ok,
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn boolean(success: bool) -> Self {
        Response::Bool { success }
    }

    /// Client-facing address of a storage node.
    pub fn storage(node: &StorageNodeInfo) -> Self {
        Response::Storage {
            server_ip: node.server_ip.clone(),
            server_port: node.client_port,
        }
    }

    pub fn files(files: Vec<String>) -> Self {
        Response::Files { files }
    }

    pub fn ok() -> Self {
        Response::Ok
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(error: &Error) -> Self {
        Response::error(ErrorKind::from(error), error.to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

/// Command sent by the naming server to a storage node's command port
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum StorageCommand {
    Create {
        path: String,
    },
    Delete {
        path: String,
    },
    /// Fetch `path` from the storage node at `server_ip:server_port`.
    Copy {
        path: String,
        server_ip: String,
        server_port: u16,
    },
}

impl StorageCommand {
    pub fn copy_from(path: impl Into<String>, source: &StorageNodeInfo) -> Self {
        StorageCommand::Copy {
            path: path.into(),
            server_ip: source.server_ip.clone(),
            server_port: source.client_port,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            StorageCommand::Create { path }
            | StorageCommand::Delete { path }
            | StorageCommand::Copy { path, .. } => path,
        }
    }
}

/// Storage node reply to a [`StorageCommand`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Serializes `message` as one protocol line, trailing newline included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim_end())
}
