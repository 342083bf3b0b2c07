//! Access-triggered replication and write-triggered invalidation
//!
//! The controller splits every decision into a bookkeeping step, applied to
//! a [`FileEntry`] while the caller holds the tree lock, and a command step
//! that talks to storage nodes after the tree lock has been dropped.

use tracing::{debug, info, warn};

use crate::path::NodePath;
use crate::storage::StorageCommands;
use crate::tree::FileEntry;
use crate::types::{Replica, ReplicaState, StorageNodeInfo};

/// Copies to issue after a file crossed the replication threshold
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyPlan {
    pub path: NodePath,
    pub source: StorageNodeInfo,
    pub targets: Vec<StorageNodeInfo>,
}

/// Outcome of one copy command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyOutcome {
    pub node: StorageNodeInfo,
    pub state: ReplicaState,
}

#[derive(Clone, Copy, Debug)]
pub struct ReplicationController {
    threshold: u32,
}

impl ReplicationController {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Counts one shared access to `entry`.
    ///
    /// Once the counter exceeds the threshold it is reset and every
    /// registered node without a copy is added as a pending replica. The
    /// returned plan lists those nodes; `None` means nothing to copy.
    pub fn on_shared_access(
        &self,
        path: &NodePath,
        entry: &mut FileEntry,
        registered: &[StorageNodeInfo],
    ) -> Option<CopyPlan> {
        entry.access_count = entry.access_count.saturating_add(1);
        if entry.access_count <= self.threshold {
            return None;
        }
        entry.access_count = 0;

        let targets: Vec<StorageNodeInfo> = registered
            .iter()
            .filter(|node| !entry.has_copy_on(node))
            .cloned()
            .collect();
        if targets.is_empty() {
            debug!(path = %path, "replication threshold crossed, no nodes left to copy to");
            return None;
        }

        entry.replicas.extend(targets.iter().map(|node| Replica {
            node: node.clone(),
            state: ReplicaState::Pending,
        }));
        info!(path = %path, targets = targets.len(), "replicating hot file");
        Some(CopyPlan {
            path: path.clone(),
            source: entry.host.clone(),
            targets,
        })
    }

    /// Resets the counter and detaches every replica, returning the nodes
    /// whose copies must now be deleted.
    pub fn on_exclusive_access(&self, entry: &mut FileEntry) -> Vec<StorageNodeInfo> {
        entry.access_count = 0;
        entry.replicas.drain(..).map(|replica| replica.node).collect()
    }

    /// Sends the copy commands of `plan`. Failures are logged and reported
    /// as [`ReplicaState::Failed`], never retried.
    pub fn replicate(&self, commands: &dyn StorageCommands, plan: &CopyPlan) -> Vec<CopyOutcome> {
        plan.targets
            .iter()
            .map(|node| {
                let state = match commands.copy(node, &plan.path, &plan.source) {
                    Ok(()) => ReplicaState::Confirmed,
                    Err(e) => {
                        warn!(path = %plan.path, node = %node, error = %e, "replica copy failed");
                        ReplicaState::Failed
                    }
                };
                CopyOutcome {
                    node: node.clone(),
                    state,
                }
            })
            .collect()
    }

    /// Deletes the replicas of `path` held by `nodes`, best effort.
    pub fn invalidate(
        &self,
        commands: &dyn StorageCommands,
        path: &NodePath,
        nodes: &[StorageNodeInfo],
    ) {
        for node in nodes {
            if let Err(e) = commands.delete(node, path) {
                warn!(path = %path, node = %node, error = %e, "replica delete failed, copy may be orphaned");
            }
        }
    }

    /// Records copy outcomes on pending entries. Entries that were
    /// invalidated in the meantime are left alone.
    pub fn settle(&self, entry: &mut FileEntry, outcomes: &[CopyOutcome]) {
        for outcome in outcomes {
            if let Some(replica) = entry
                .replicas
                .iter_mut()
                .find(|r| r.node == outcome.node && r.state == ReplicaState::Pending)
            {
                replica.state = outcome.state;
            }
        }
    }
}

impl Default for ReplicationController {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REPLICATION_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{IssuedCommand, RecordingCommands};

    fn node(port: u16) -> StorageNodeInfo {
        StorageNodeInfo::new("10.0.0.1", port, port + 1)
    }

    fn path() -> NodePath {
        "/hot.bin".parse().unwrap()
    }

    #[test]
    fn test_replicates_once_threshold_exceeded() {
        let controller = ReplicationController::new(3);
        let mut entry = FileEntry::new(node(100));
        let registered = [node(100), node(200), node(300)];

        for _ in 0..3 {
            assert!(controller.on_shared_access(&path(), &mut entry, &registered).is_none());
        }
        assert_eq!(entry.access_count, 3);

        let plan = controller
            .on_shared_access(&path(), &mut entry, &registered)
            .unwrap();
        assert_eq!(plan.targets, [node(200), node(300)]);
        assert_eq!(plan.source, node(100));
        assert_eq!(entry.access_count, 0);
        assert!(entry
            .replicas
            .iter()
            .all(|r| r.state == ReplicaState::Pending));
    }

    #[test]
    fn test_existing_replicas_are_not_copied_again() {
        let controller = ReplicationController::new(0);
        let mut entry = FileEntry::new(node(100));
        let registered = [node(100), node(200)];

        assert!(controller.on_shared_access(&path(), &mut entry, &registered).is_some());
        assert!(controller.on_shared_access(&path(), &mut entry, &registered).is_none());
        assert_eq!(entry.replicas.len(), 1);
    }

    #[test]
    fn test_exclusive_access_drains_replicas() {
        let controller = ReplicationController::new(0);
        let mut entry = FileEntry::new(node(100));
        controller.on_shared_access(&path(), &mut entry, &[node(200)]);
        entry.access_count = 7;

        let stale = controller.on_exclusive_access(&mut entry);
        assert_eq!(stale, [node(200)]);
        assert!(entry.replicas.is_empty());
        assert_eq!(entry.access_count, 0);
    }

    #[test]
    fn test_failed_copy_is_recorded_not_dropped() {
        let controller = ReplicationController::new(0);
        let commands = RecordingCommands::new();
        commands.fail_on(node(300));

        let mut entry = FileEntry::new(node(100));
        let plan = controller
            .on_shared_access(&path(), &mut entry, &[node(200), node(300)])
            .unwrap();
        let outcomes = controller.replicate(&commands, &plan);
        controller.settle(&mut entry, &outcomes);

        let states: Vec<_> = entry.replicas.iter().map(|r| r.state).collect();
        assert_eq!(states, [ReplicaState::Confirmed, ReplicaState::Failed]);
        assert_eq!(
            commands.issued()[0],
            IssuedCommand::Copy {
                node: node(200),
                path: path(),
                source: node(100),
            }
        );
    }

    #[test]
    fn test_invalidate_swallows_failures() {
        let controller = ReplicationController::default();
        let commands = RecordingCommands::new();
        commands.fail_on(node(200));

        controller.invalidate(&commands, &path(), &[node(200), node(300)]);
        assert_eq!(commands.issued().len(), 2);
    }
}
