//! TCP transport for commands sent to storage nodes

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use dfs_core::{Error, NamingResult, NodePath, StorageCommands, StorageNodeInfo};
use dfs_proto::{decode_line, encode_line, CommandResponse, StorageCommand};
use tracing::debug;

/// Errors raised while talking to a storage node's command port.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("cannot resolve storage node address {0}")]
    Resolve(String),

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("storage node closed the connection without replying")]
    Closed,

    #[error("storage node rejected the command: {0}")]
    Rejected(String),
}

/// Sends one JSON line per command and waits for a one line reply.
///
/// Calls block for at most the configured timeout per connect, read and
/// write, so they must run off the async runtime.
#[derive(Clone, Debug)]
pub struct TcpStorageCommands {
    timeout: Duration,
}

impl TcpStorageCommands {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn send(&self, node: &StorageNodeInfo, command: &StorageCommand) -> Result<(), CommandError> {
        let target = format!("{}:{}", node.server_ip, node.command_port);
        let addr = target
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| CommandError::Resolve(target.clone()))?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        stream.write_all(encode_line(command)?.as_bytes())?;
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(CommandError::Closed);
        }

        let response: CommandResponse = decode_line(&line)?;
        debug!(node = %target, path = command.path(), success = response.success, "storage command answered");
        if response.success {
            Ok(())
        } else {
            Err(CommandError::Rejected(
                response.error.unwrap_or_else(|| "no reason given".to_string()),
            ))
        }
    }

    fn dispatch(&self, node: &StorageNodeInfo, command: StorageCommand) -> NamingResult<()> {
        self.send(node, &command)
            .map_err(|e| Error::remote(node, e.to_string()))
    }
}

impl StorageCommands for TcpStorageCommands {
    fn create(&self, node: &StorageNodeInfo, path: &NodePath) -> NamingResult<()> {
        self.dispatch(
            node,
            StorageCommand::Create {
                path: path.to_string(),
            },
        )
    }

    fn delete(&self, node: &StorageNodeInfo, path: &NodePath) -> NamingResult<()> {
        self.dispatch(
            node,
            StorageCommand::Delete {
                path: path.to_string(),
            },
        )
    }

    fn copy(
        &self,
        node: &StorageNodeInfo,
        path: &NodePath,
        source: &StorageNodeInfo,
    ) -> NamingResult<()> {
        self.dispatch(node, StorageCommand::copy_from(path.to_string(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Answers exactly one command with `reply` and hands back what it read.
    fn one_shot_node(reply: &'static str) -> (StorageNodeInfo, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            (&stream).write_all(reply.as_bytes()).unwrap();
            line
        });
        (StorageNodeInfo::new("127.0.0.1", 1, port), handle)
    }

    #[test]
    fn test_create_is_sent_as_one_line() {
        let (node, handle) = one_shot_node("{\"success\":true}\n");
        let commands = TcpStorageCommands::new(Duration::from_secs(2));
        commands.create(&node, &"/a/b".parse().unwrap()).unwrap();

        let sent = handle.join().unwrap();
        assert_eq!(sent, "{\"command\":\"create\",\"path\":\"/a/b\"}\n");
    }

    #[test]
    fn test_rejection_becomes_remote_error() {
        let (node, handle) = one_shot_node("{\"success\":false,\"error\":\"disk full\"}\n");
        let commands = TcpStorageCommands::new(Duration::from_secs(2));
        let err = commands
            .delete(&node, &"/x".parse().unwrap())
            .unwrap_err();
        handle.join().unwrap();

        match err {
            Error::RemoteCommand { reason, .. } => assert!(reason.contains("disk full")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_node() {
        // Bind then drop to find a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let node = StorageNodeInfo::new("127.0.0.1", 1, port);
        let commands = TcpStorageCommands::new(Duration::from_millis(500));
        assert!(matches!(
            commands.create(&node, &"/f".parse().unwrap()),
            Err(Error::RemoteCommand { .. })
        ));
    }
}
