//! dfs-core: in-memory namespace of the distributed file store naming server
//!
//! This crate holds the path tree, the per-node reader/writer locks, the
//! replica controller and the [`NamingCoordinator`] that ties them together.
//! Storage nodes are reached only through the [`StorageCommands`] trait, so
//! transports live in the daemon crate.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod path;
pub mod replication;
pub mod storage;
pub mod tree;
pub mod types;

// Re-export key types for convenience
pub use config::{NamingConfig, PlacementPolicy, DEFAULT_REPLICATION_THRESHOLD};
pub use coordinator::NamingCoordinator;
pub use error::{Error, NamingResult};
pub use lock::{LockSnapshot, LockTable, PerNodeLock};
pub use path::NodePath;
pub use replication::{CopyPlan, ReplicationController};
pub use storage::{IssuedCommand, RecordingCommands, StorageCommands};
pub use tree::{FileEntry, FileTarget, Node, NodeKind, PathTree};
pub use types::*;
