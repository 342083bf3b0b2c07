//! Syntactic validation of naming protocol messages

use dfs_core::NodePath;
use thiserror::Error;

use crate::messages::{decode_line, ErrorKind, Request, StorageCommand};

/// Validation error
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("{field} must be a non-zero port")]
    InvalidPort { field: &'static str },
    #[error("storage address must not be empty")]
    EmptyAddress,
    #[error("json parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ValidationError {
    /// Wire error kind reported to the peer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::InvalidPath(_) => ErrorKind::InvalidPath,
            _ => ErrorKind::InvalidRequest,
        }
    }
}

fn check_path(path: &str) -> Result<(), ValidationError> {
    if NodePath::is_valid(path) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPath(path.to_string()))
    }
}

fn check_port(port: u16, field: &'static str) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::InvalidPort { field });
    }
    Ok(())
}

/// Validate a decoded naming request.
///
/// `is_valid_path` is exempt from path checks since answering whether a
/// path is valid is its whole purpose.
pub fn validate_request(request: &Request) -> Result<(), ValidationError> {
    match request {
        Request::IsValidPath { .. } => Ok(()),
        Request::Register(register) => {
            if register.storage_ip.trim().is_empty() {
                return Err(ValidationError::EmptyAddress);
            }
            check_port(register.client_port, "client_port")?;
            check_port(register.command_port, "command_port")?;
            register.files.iter().try_for_each(|file| check_path(file))
        }
        other => other.path().map_or(Ok(()), check_path),
    }
}

pub fn validate_command(command: &StorageCommand) -> Result<(), ValidationError> {
    check_path(command.path())?;
    if let StorageCommand::Copy {
        server_ip,
        server_port,
        ..
    } = command
    {
        if server_ip.trim().is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        check_port(*server_port, "server_port")?;
    }
    Ok(())
}

/// Decode and validate one request line.
pub fn parse_request(line: &str) -> Result<Request, ValidationError> {
    let request: Request = decode_line(line)?;
    validate_request(&request)?;
    Ok(request)
}

pub fn parse_command(line: &str) -> Result<StorageCommand, ValidationError> {
    let command: StorageCommand = decode_line(line)?;
    validate_command(&command)?;
    Ok(command)
}
