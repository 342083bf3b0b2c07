//! Core type definitions for the naming server

use std::fmt;

use serde::{Deserialize, Serialize};

/// A registered storage node: its address plus the port clients read and
/// write bytes on and the port that accepts create/delete/copy commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageNodeInfo {
    pub server_ip: String,
    pub client_port: u16,
    pub command_port: u16,
}

impl StorageNodeInfo {
    pub fn new(server_ip: impl Into<String>, client_port: u16, command_port: u16) -> Self {
        Self {
            server_ip: server_ip.into(),
            client_port,
            command_port,
        }
    }

    /// Identity of the client-facing interface.
    pub fn client_endpoint(&self) -> (&str, u16) {
        (&self.server_ip, self.client_port)
    }

    /// Identity of the command interface.
    pub fn command_endpoint(&self) -> (&str, u16) {
        (&self.server_ip, self.command_port)
    }

    /// True if either interface collides with one of `other`'s interfaces.
    pub fn conflicts_with(&self, other: &StorageNodeInfo) -> bool {
        self.client_endpoint() == other.client_endpoint()
            || self.command_endpoint() == other.command_endpoint()
    }
}

impl fmt::Display for StorageNodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (client {}, command {})",
            self.server_ip, self.client_port, self.command_port
        )
    }
}

/// Access mode requested on a path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    pub fn from_exclusive(exclusive: bool) -> Self {
        if exclusive {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        }
    }

    pub fn is_exclusive(self) -> bool {
        matches!(self, LockMode::Exclusive)
    }
}

/// Confirmation state of a secondary copy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaState {
    /// Copy command issued, outcome not yet known.
    Pending,
    Confirmed,
    /// The copy command failed; the entry stays so it is not retried.
    Failed,
}

/// A storage node holding a secondary copy of a file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub node: StorageNodeInfo,
    pub state: ReplicaState,
}
