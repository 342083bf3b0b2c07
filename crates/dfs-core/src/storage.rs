//! Commands the naming server sends to storage nodes

use parking_lot::Mutex;

use crate::error::{Error, NamingResult};
use crate::path::NodePath;
use crate::types::StorageNodeInfo;

/// Outbound command interface of the storage nodes.
///
/// Every call is synchronous and may block on the network; the coordinator
/// never invokes it while holding the namespace tree lock.
pub trait StorageCommands: Send + Sync {
    /// Create an empty file on `node`.
    fn create(&self, node: &StorageNodeInfo, path: &NodePath) -> NamingResult<()>;
    /// Remove the file or directory at `path` from `node`.
    fn delete(&self, node: &StorageNodeInfo, path: &NodePath) -> NamingResult<()>;
    /// Make `node` fetch a copy of `path` from `source`.
    fn copy(&self, node: &StorageNodeInfo, path: &NodePath, source: &StorageNodeInfo)
        -> NamingResult<()>;
}

/// A command seen by [`RecordingCommands`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssuedCommand {
    Create {
        node: StorageNodeInfo,
        path: NodePath,
    },
    Delete {
        node: StorageNodeInfo,
        path: NodePath,
    },
    Copy {
        node: StorageNodeInfo,
        path: NodePath,
        source: StorageNodeInfo,
    },
}

impl IssuedCommand {
    pub fn node(&self) -> &StorageNodeInfo {
        match self {
            IssuedCommand::Create { node, .. }
            | IssuedCommand::Delete { node, .. }
            | IssuedCommand::Copy { node, .. } => node,
        }
    }
}

/// In-memory command sink that records what would have been sent
///
/// Nodes added with [`RecordingCommands::fail_on`] reject every command.
/// Rejected commands are still recorded.
#[derive(Debug, Default)]
pub struct RecordingCommands {
    issued: Mutex<Vec<IssuedCommand>>,
    failing: Mutex<Vec<StorageNodeInfo>>,
}

impl RecordingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, node: StorageNodeInfo) {
        self.failing.lock().push(node);
    }

    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.issued.lock().clone()
    }

    /// Returns and forgets everything recorded so far.
    pub fn take(&self) -> Vec<IssuedCommand> {
        std::mem::take(&mut *self.issued.lock())
    }

    fn record(&self, command: IssuedCommand) -> NamingResult<()> {
        let node = command.node().clone();
        self.issued.lock().push(command);
        if self.failing.lock().contains(&node) {
            return Err(Error::remote(&node, "rejected by test double"));
        }
        Ok(())
    }
}

impl StorageCommands for RecordingCommands {
    fn create(&self, node: &StorageNodeInfo, path: &NodePath) -> NamingResult<()> {
        self.record(IssuedCommand::Create {
            node: node.clone(),
            path: path.clone(),
        })
    }

    fn delete(&self, node: &StorageNodeInfo, path: &NodePath) -> NamingResult<()> {
        self.record(IssuedCommand::Delete {
            node: node.clone(),
            path: path.clone(),
        })
    }

    fn copy(
        &self,
        node: &StorageNodeInfo,
        path: &NodePath,
        source: &StorageNodeInfo,
    ) -> NamingResult<()> {
        self.record(IssuedCommand::Copy {
            node: node.clone(),
            path: path.clone(),
            source: source.clone(),
        })
    }
}
