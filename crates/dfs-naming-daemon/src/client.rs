//! Client library for communicating with the naming server.

use dfs_core::{LockMode, StorageNodeInfo};
use dfs_proto::{decode_line, encode_line, ErrorKind, Request, Response};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Default address of the naming server's service listener.
pub const DEFAULT_SERVICE_ADDR: &str = "127.0.0.1:8080";

/// Default address of the naming server's registration listener.
pub const DEFAULT_REGISTRATION_ADDR: &str = "127.0.0.1:8090";

/// Blocking client for either naming server listener.
///
/// Each call opens a fresh connection. Path locks outlive the connection
/// that took them, so `lock` and `unlock` may come from different clients.
#[derive(Clone, Debug)]
pub struct NamingClient {
    addr: String,
    timeout: Option<Duration>,
}

impl NamingClient {
    /// Create a client for the service listener at the default address.
    pub fn new() -> Self {
        Self::with_addr(DEFAULT_SERVICE_ADDR)
    }

    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: None,
        }
    }

    /// Bound socket reads and writes. Lock requests may legitimately wait
    /// a long time, so no timeout is set by default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send a request to the naming server and wait for a response.
    pub fn send_request(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = TcpStream::connect(&self.addr).map_err(|e| {
            ClientError::Connection(format!("Failed to connect to {}: {}", self.addr, e))
        })?;
        stream
            .set_read_timeout(self.timeout)
            .and_then(|_| stream.set_write_timeout(self.timeout))
            .map_err(|e| ClientError::Communication(format!("Failed to set timeout: {}", e)))?;

        let line = encode_line(request)
            .map_err(|e| ClientError::Protocol(format!("Failed to encode request: {}", e)))?;
        stream.write_all(line.as_bytes()).map_err(|e| {
            ClientError::Communication(format!("Failed to send request: {}", e))
        })?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        let n = reader.read_line(&mut response_line).map_err(|e| {
            ClientError::Communication(format!("Failed to read response: {}", e))
        })?;
        if n == 0 {
            return Err(ClientError::Communication(
                "Connection closed before a response arrived".to_string(),
            ));
        }

        decode_line(&response_line)
            .map_err(|e| ClientError::Protocol(format!("Failed to decode response: {}", e)))
    }

    pub fn is_valid_path(&self, path: &str) -> Result<bool, ClientError> {
        expect_bool(self.send_request(&Request::is_valid_path(path))?, "is_valid_path")
    }

    /// Client-facing address of the storage node hosting `path`.
    pub fn get_storage(&self, path: &str) -> Result<(String, u16), ClientError> {
        match self.send_request(&Request::get_storage(path))? {
            Response::Storage {
                server_ip,
                server_port,
            } => Ok((server_ip, server_port)),
            other => Err(unexpected(other, "get_storage")),
        }
    }

    pub fn create_directory(&self, path: &str) -> Result<bool, ClientError> {
        expect_bool(
            self.send_request(&Request::create_directory(path))?,
            "create_directory",
        )
    }

    pub fn create_file(&self, path: &str) -> Result<bool, ClientError> {
        expect_bool(self.send_request(&Request::create_file(path))?, "create_file")
    }

    pub fn delete(&self, path: &str) -> Result<bool, ClientError> {
        expect_bool(self.send_request(&Request::delete(path))?, "delete")
    }

    pub fn list(&self, path: &str) -> Result<Vec<String>, ClientError> {
        expect_files(self.send_request(&Request::list(path))?, "list")
    }

    pub fn is_directory(&self, path: &str) -> Result<bool, ClientError> {
        expect_bool(self.send_request(&Request::is_directory(path))?, "is_directory")
    }

    /// Announce a storage node; returns the files it must delete locally.
    /// Must be sent to the registration listener.
    pub fn register(
        &self,
        node: &StorageNodeInfo,
        files: Vec<String>,
    ) -> Result<Vec<String>, ClientError> {
        expect_files(self.send_request(&Request::register(node, files))?, "register")
    }

    pub fn lock(&self, path: &str, mode: LockMode) -> Result<(), ClientError> {
        expect_ok(self.send_request(&Request::lock(path, mode))?, "lock")
    }

    pub fn unlock(&self, path: &str, mode: LockMode) -> Result<(), ClientError> {
        expect_ok(self.send_request(&Request::unlock(path, mode))?, "unlock")
    }
}

impl Default for NamingClient {
    fn default() -> Self {
        Self::new()
    }
}

fn unexpected(response: Response, op: &str) -> ClientError {
    match response {
        Response::Error { kind, message } => ClientError::Remote { kind, message },
        other => ClientError::Protocol(format!("Unexpected response to {}: {:?}", op, other)),
    }
}

fn expect_bool(response: Response, op: &str) -> Result<bool, ClientError> {
    match response {
        Response::Bool { success } => Ok(success),
        other => Err(unexpected(other, op)),
    }
}

fn expect_files(response: Response, op: &str) -> Result<Vec<String>, ClientError> {
    match response {
        Response::Files { files } => Ok(files),
        other => Err(unexpected(other, op)),
    }
}

fn expect_ok(response: Response, op: &str) -> Result<(), ClientError> {
    match response {
        Response::Ok => Ok(()),
        other => Err(unexpected(other, op)),
    }
}

/// Errors that can occur when communicating with the naming server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect to naming server: {0}")]
    Connection(String),

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Naming server error ({kind:?}): {message}")]
    Remote { kind: ErrorKind, message: String },
}

impl ClientError {
    /// Error kind reported by the server, if the server answered at all.
    pub fn remote_kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
