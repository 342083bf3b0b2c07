//! Naming operations on top of the path locking protocol
//!
//! Every path-addressed lock is taken root to leaf: Shared on each ancestor,
//! the requested mode on the target. The tree itself sits behind a short
//! lived `RwLock` that is never held across a per-node lock wait or a
//! storage command.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{NamingConfig, PlacementPolicy};
use crate::error::{Error, NamingResult};
use crate::lock::{LockSnapshot, LockTable, PerNodeLock};
use crate::path::NodePath;
use crate::replication::ReplicationController;
use crate::storage::StorageCommands;
use crate::tree::{FileEntry, Node, PathTree};
use crate::types::{LockMode, StorageNodeInfo};

/// Locks taken during one walk, released root to leaf when dropped
#[derive(Default)]
struct PathLocks {
    held: Vec<(Arc<PerNodeLock>, LockMode)>,
}

impl PathLocks {
    fn push(&mut self, lock: Arc<PerNodeLock>, mode: LockMode) {
        self.held.push((lock, mode));
    }

    fn release_last(&mut self) {
        if let Some((lock, mode)) = self.held.pop() {
            lock.release(mode);
        }
    }

    /// Hands the locks over to the caller; they stay held until `unlock`.
    fn keep(mut self) {
        self.held.clear();
    }
}

impl Drop for PathLocks {
    fn drop(&mut self) {
        for (lock, mode) in self.held.drain(..) {
            lock.release(mode);
        }
    }
}

/// The naming authority's shared state: namespace, locks and storage nodes.
pub struct NamingCoordinator {
    config: NamingConfig,
    tree: RwLock<PathTree>,
    locks: LockTable,
    storage_nodes: RwLock<Vec<StorageNodeInfo>>,
    replication: ReplicationController,
    commands: Arc<dyn StorageCommands>,
    next_host: AtomicUsize,
}

impl NamingCoordinator {
    pub fn new(config: NamingConfig, commands: Arc<dyn StorageCommands>) -> Self {
        let replication = ReplicationController::new(config.replication_threshold);
        Self {
            config,
            tree: RwLock::new(PathTree::new()),
            locks: LockTable::new(),
            storage_nodes: RwLock::new(Vec::new()),
            replication,
            commands,
            next_host: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    pub fn is_valid_path(raw: &str) -> bool {
        NodePath::is_valid(raw)
    }

    /// Records a storage node and adopts the files it already holds.
    ///
    /// Returns the announced paths the node must delete locally because
    /// they are already hosted elsewhere or cannot be placed.
    pub fn register(&self, info: StorageNodeInfo, files: &[String]) -> NamingResult<Vec<String>> {
        let paths = files
            .iter()
            .map(|raw| NodePath::parse(raw))
            .collect::<NamingResult<Vec<_>>>()?;

        {
            let mut nodes = self.storage_nodes.write();
            if nodes.iter().any(|existing| existing.conflicts_with(&info)) {
                return Err(Error::DuplicateRegistration(info.to_string()));
            }
            nodes.push(info.clone());
        }
        info!(node = %info, announced = paths.len(), "storage node registered");

        let mut adopted = Vec::new();
        let mut duplicates = Vec::new();
        for path in paths.iter().filter(|path| !path.is_root()) {
            match self.adopt_file(path, &info) {
                Ok(true) => adopted.push(path),
                Ok(false) => duplicates.push(path.to_string()),
                Err(e) => {
                    warn!(node = %info, path = %path, error = %e, "registration failed");
                    self.unregister(&info, &adopted);
                    return Err(e);
                }
            }
        }
        if !duplicates.is_empty() {
            info!(node = %info, duplicates = duplicates.len(), "asking storage node to drop duplicates");
        }
        Ok(duplicates)
    }

    /// Undoes a failed registration so the node can announce itself again.
    /// Directories created for adopted files stay.
    fn unregister(&self, info: &StorageNodeInfo, adopted: &[&NodePath]) {
        {
            let mut tree = self.tree.write();
            for path in adopted {
                if tree.hosting_server(path) == Some(info) {
                    if let Err(e) = tree.delete(path) {
                        warn!(path = %path, error = %e, "could not drop adopted file");
                    }
                }
            }
        }
        self.storage_nodes.write().retain(|node| node != info);
        info!(node = %info, dropped = adopted.len(), "storage node registration rolled back");
    }

    pub fn get_storage(&self, path: &NodePath) -> NamingResult<StorageNodeInfo> {
        let tree = self.tree.read();
        let node = tree
            .lookup(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        node.as_file()
            .map(|entry| entry.host.clone())
            .ok_or_else(|| Error::IsADirectory(path.to_string()))
    }

    pub fn create_directory(&self, path: &NodePath) -> NamingResult<bool> {
        if path.is_root() || self.exists(path) {
            return Ok(false);
        }
        let _held = self.lock_for_insert(path)?;
        let created = self.tree.write().create_directory(path);
        match created {
            Ok(()) => {
                debug!(path = %path, "directory created");
                Ok(true)
            }
            Err(e) => Self::insert_outcome(path, e),
        }
    }

    pub fn create_file(&self, path: &NodePath) -> NamingResult<bool> {
        if path.is_root() || self.exists(path) {
            return Ok(false);
        }
        let _held = self.lock_for_insert(path)?;
        let host = self.choose_host()?;
        let created = self.tree.write().create_file(path, host.clone());
        if let Err(e) = created {
            return Self::insert_outcome(path, e);
        }

        if let Err(e) = self.commands.create(&host, path) {
            warn!(path = %path, node = %host, error = %e, "create command failed, rolling back");
            if let Err(rollback) = self.tree.write().delete(path) {
                warn!(path = %path, error = %rollback, "rollback of failed create did not apply");
            }
            return Err(e);
        }
        debug!(path = %path, node = %host, "file created");
        Ok(true)
    }

    /// Removes `path` and everything below it, including every primary and
    /// replica copy held by storage nodes. Deleting the root is refused.
    pub fn delete(&self, path: &NodePath) -> NamingResult<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let _held = self.lock_walk(path, LockMode::Exclusive)?;
        let targets = self.tree.read().files_under(path)?;
        let is_directory = self.tree.read().is_directory(path)?;

        let mut touched = HashSet::new();
        for target in &targets {
            self.replication
                .invalidate(self.commands.as_ref(), &target.path, &target.replicas);
            if let Err(e) = self.commands.delete(&target.host, &target.path) {
                warn!(path = %target.path, node = %target.host, error = %e, "primary delete failed");
            }
            touched.insert(target.host.clone());
            touched.extend(target.replicas.iter().cloned());
        }
        if is_directory {
            // Prune the now empty directory from every node that held a file in it.
            for node in &touched {
                if let Err(e) = self.commands.delete(node, path) {
                    warn!(path = %path, node = %node, error = %e, "directory delete failed");
                }
            }
        }

        self.tree.write().delete(path)?;
        info!(path = %path, files = targets.len(), "deleted");
        Ok(true)
    }

    pub fn list(&self, path: &NodePath) -> NamingResult<Vec<String>> {
        self.tree.read().list_children(path)
    }

    pub fn is_directory(&self, path: &NodePath) -> NamingResult<bool> {
        self.tree.read().is_directory(path)
    }

    /// Takes the path locks for `path` and keeps them until [`Self::release_path`].
    ///
    /// Shared access to a file counts toward replication. Exclusive access
    /// to a file invalidates its replicas before returning.
    pub fn acquire_path(&self, path: &NodePath, mode: LockMode) -> NamingResult<()> {
        let held = self.lock_walk(path, mode)?;
        match mode {
            LockMode::Shared => self.drive_shared_access(path),
            LockMode::Exclusive => self.drive_exclusive_access(path),
        }
        held.keep();
        Ok(())
    }

    pub fn release_path(&self, path: &NodePath, mode: LockMode) -> NamingResult<()> {
        if !self.exists(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        let depth = path.depth();
        for prefix in path.prefixes() {
            let step = if prefix.depth() == depth { mode } else { LockMode::Shared };
            match self.locks.get(&prefix) {
                Some(lock) => {
                    lock.release(step);
                }
                None => warn!(path = %prefix, "unlock on a node that was never locked"),
            }
        }
        Ok(())
    }

    pub fn exists(&self, path: &NodePath) -> bool {
        self.tree.read().exists(path)
    }

    pub fn storage_nodes(&self) -> Vec<StorageNodeInfo> {
        self.storage_nodes.read().clone()
    }

    /// Copy of a file's hosting metadata.
    pub fn file_entry(&self, path: &NodePath) -> Option<FileEntry> {
        self.tree.read().file(path).cloned()
    }

    pub fn lock_snapshot(&self, path: &NodePath) -> Option<LockSnapshot> {
        self.locks.get(path).map(|lock| lock.snapshot())
    }

    fn wait_for(&self, path: &NodePath, mode: LockMode) -> NamingResult<Arc<PerNodeLock>> {
        let lock = self.locks.get_or_create(path);
        if lock.acquire(mode, self.config.lock_wait_timeout()) {
            Ok(lock)
        } else {
            warn!(path = %path, ?mode, "lock wait timed out");
            Err(Error::LockTimeout(path.to_string()))
        }
    }

    /// Locks every prefix of `path`, failing with `NotFound` as soon as one
    /// is missing. Existence is checked again after each wait since the node
    /// may have been removed while this caller was queued.
    fn lock_walk(&self, path: &NodePath, mode: LockMode) -> NamingResult<PathLocks> {
        let mut held = PathLocks::default();
        let depth = path.depth();
        for prefix in path.prefixes() {
            if !self.exists(&prefix) {
                return Err(Error::NotFound(path.to_string()));
            }
            let step = if prefix.depth() == depth { mode } else { LockMode::Shared };
            let lock = self.wait_for(&prefix, step)?;
            held.push(lock, step);
            if !self.exists(&prefix) {
                return Err(Error::NotFound(path.to_string()));
            }
        }
        Ok(held)
    }

    /// Shared on the parent chain plus Exclusive on the node about to appear.
    fn lock_for_insert(&self, path: &NodePath) -> NamingResult<PathLocks> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::AlreadyExists(path.to_string()))?;
        let mut held = self.lock_walk(&parent, LockMode::Shared)?;
        let lock = self.wait_for(path, LockMode::Exclusive)?;
        held.push(lock, LockMode::Exclusive);
        Ok(held)
    }

    fn insert_outcome(path: &NodePath, error: Error) -> NamingResult<bool> {
        match error {
            Error::AlreadyExists(_) => Ok(false),
            Error::NotADirectory(_) => Err(Error::NotFound(path.to_string())),
            other => Err(other),
        }
    }

    fn choose_host(&self) -> NamingResult<StorageNodeInfo> {
        let nodes = self.storage_nodes.read();
        let host = match self.config.placement {
            PlacementPolicy::LastRegistered => nodes.last(),
            PlacementPolicy::RoundRobin if nodes.is_empty() => None,
            PlacementPolicy::RoundRobin => {
                let next = self.next_host.fetch_add(1, Ordering::Relaxed);
                nodes.get(next % nodes.len())
            }
        };
        host.cloned().ok_or(Error::NoStorageNodes)
    }

    fn drive_shared_access(&self, path: &NodePath) {
        let registered = self.storage_nodes();
        let plan = {
            let mut tree = self.tree.write();
            tree.file_mut(path)
                .and_then(|entry| self.replication.on_shared_access(path, entry, &registered))
        };
        let Some(plan) = plan else {
            return;
        };

        let outcomes = self.replication.replicate(self.commands.as_ref(), &plan);
        if let Some(entry) = self.tree.write().file_mut(path) {
            self.replication.settle(entry, &outcomes);
        }
    }

    fn drive_exclusive_access(&self, path: &NodePath) {
        let stale = {
            let mut tree = self.tree.write();
            tree.file_mut(path)
                .map(|entry| self.replication.on_exclusive_access(entry))
                .unwrap_or_default()
        };
        if !stale.is_empty() {
            debug!(path = %path, replicas = stale.len(), "invalidating replicas before write");
            self.replication
                .invalidate(self.commands.as_ref(), path, &stale);
        }
    }

    /// Inserts an announced file, creating missing parent directories.
    /// Returns false if the path is taken or sits below a file.
    fn adopt_file(&self, path: &NodePath, host: &StorageNodeInfo) -> NamingResult<bool> {
        if self.exists(path) {
            return Ok(false);
        }
        let Some(parent) = path.parent() else {
            return Ok(false);
        };

        let mut held = PathLocks::default();
        for prefix in parent.prefixes() {
            loop {
                let mode = match self.node_is_directory(&prefix) {
                    Some(true) => LockMode::Shared,
                    Some(false) => return Ok(false),
                    None => LockMode::Exclusive,
                };
                let lock = self.wait_for(&prefix, mode)?;
                held.push(lock, mode);
                if mode.is_exclusive() {
                    let created = self.tree.write().create_directory(&prefix);
                    match created {
                        Ok(()) => debug!(path = %prefix, "directory discovered at registration"),
                        Err(Error::AlreadyExists(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                match self.node_is_directory(&prefix) {
                    Some(true) => break,
                    Some(false) => return Ok(false),
                    // Removed while we waited; start this level over.
                    None => held.release_last(),
                }
            }
        }

        let lock = self.wait_for(path, LockMode::Exclusive)?;
        held.push(lock, LockMode::Exclusive);
        let created = self.tree.write().create_file(path, host.clone());
        match created {
            Ok(()) => Ok(true),
            Err(Error::AlreadyExists(_) | Error::NotADirectory(_) | Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn node_is_directory(&self, path: &NodePath) -> Option<bool> {
        self.tree.read().lookup(path).map(Node::is_directory)
    }
}
