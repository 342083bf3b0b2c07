// Distributed file store naming daemon
//
// This crate hosts the naming server: two TCP listeners speaking the
// line-delimited JSON protocol, the transport for storage node commands
// and a blocking client.

pub mod client;
pub mod commands;
pub mod config;
pub mod operations;
pub mod server;

use std::sync::Arc;

use dfs_core::{NamingConfig, NamingCoordinator};

use crate::commands::TcpStorageCommands;

/// Coordinator wired to real storage nodes over TCP.
pub fn tcp_coordinator(config: NamingConfig) -> NamingCoordinator {
    let commands = Arc::new(TcpStorageCommands::new(config.command_timeout()));
    NamingCoordinator::new(config, commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{process_request, Listener};
    use dfs_proto::{Request, Response};

    #[test]
    fn test_fresh_coordinator_lists_empty_root() {
        let naming = tcp_coordinator(NamingConfig::default());
        let response = process_request(&naming, Request::list("/"), Listener::Service);
        assert_eq!(response, Response::files(vec![]));
    }

    #[test]
    fn test_create_file_needs_storage_node() {
        let naming = tcp_coordinator(NamingConfig::default());
        let response = process_request(&naming, Request::create_file("/f"), Listener::Service);
        assert!(matches!(
            response,
            Response::Error {
                kind: dfs_proto::ErrorKind::NoStorageNodes,
                ..
            }
        ));
    }
}
