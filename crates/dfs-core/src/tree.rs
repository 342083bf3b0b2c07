//! Hierarchical namespace for the naming server

use indexmap::IndexMap;

use crate::error::{Error, NamingResult};
use crate::path::NodePath;
use crate::types::{Replica, StorageNodeInfo};

/// Hosting metadata of a file node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// Storage node holding the primary copy.
    pub host: StorageNodeInfo,
    /// Storage nodes holding secondary copies.
    pub replicas: Vec<Replica>,
    /// Shared accesses since creation, the last write, or the last replication.
    pub access_count: u32,
}

impl FileEntry {
    pub fn new(host: StorageNodeInfo) -> Self {
        Self {
            host,
            replicas: Vec::new(),
            access_count: 0,
        }
    }

    pub fn replica_nodes(&self) -> impl Iterator<Item = &StorageNodeInfo> {
        self.replicas.iter().map(|replica| &replica.node)
    }

    /// True if `node` hosts the primary or is already listed as a replica.
    pub fn has_copy_on(&self, node: &StorageNodeInfo) -> bool {
        self.host == *node || self.replica_nodes().any(|replica| replica == node)
    }
}

/// Namespace node types
#[derive(Clone, Debug)]
pub enum NodeKind {
    Directory { children: IndexMap<String, Node> },
    File(FileEntry),
}

/// Namespace node
#[derive(Clone, Debug)]
pub struct Node {
    path: NodePath,
    kind: NodeKind,
}

impl Node {
    fn directory(path: NodePath) -> Self {
        Self {
            path,
            kind: NodeKind::Directory {
                children: IndexMap::new(),
            },
        }
    }

    fn file(path: NodePath, host: StorageNodeInfo) -> Self {
        Self {
            path,
            kind: NodeKind::File(FileEntry::new(host)),
        }
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match &self.kind {
            NodeKind::File(entry) => Some(entry),
            NodeKind::Directory { .. } => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileEntry> {
        match &mut self.kind {
            NodeKind::File(entry) => Some(entry),
            NodeKind::Directory { .. } => None,
        }
    }

    fn collect_files(&self, out: &mut Vec<FileTarget>) {
        match &self.kind {
            NodeKind::File(entry) => out.push(FileTarget {
                path: self.path.clone(),
                host: entry.host.clone(),
                replicas: entry.replica_nodes().cloned().collect(),
            }),
            NodeKind::Directory { children } => {
                for child in children.values() {
                    child.collect_files(out);
                }
            }
        }
    }
}

/// Every copy of one file, gathered before the file is removed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileTarget {
    pub path: NodePath,
    pub host: StorageNodeInfo,
    pub replicas: Vec<StorageNodeInfo>,
}

/// The namespace tree, rooted at a directory with the empty path.
///
/// Purely structural: callers are responsible for path locking and for
/// telling storage nodes about created or removed files.
#[derive(Debug)]
pub struct PathTree {
    root: Node,
}

impl PathTree {
    pub fn new() -> Self {
        Self {
            root: Node::directory(NodePath::root()),
        }
    }

    pub fn lookup(&self, path: &NodePath) -> Option<&Node> {
        let mut current = &self.root;
        for segment in path.segments() {
            match &current.kind {
                NodeKind::Directory { children } => current = children.get(segment)?,
                NodeKind::File(_) => return None,
            }
        }
        Some(current)
    }

    pub fn lookup_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        let mut current = &mut self.root;
        for segment in path.segments() {
            match &mut current.kind {
                NodeKind::Directory { children } => current = children.get_mut(segment)?,
                NodeKind::File(_) => return None,
            }
        }
        Some(current)
    }

    pub fn exists(&self, path: &NodePath) -> bool {
        self.lookup(path).is_some()
    }

    pub fn is_directory(&self, path: &NodePath) -> NamingResult<bool> {
        self.lookup(path)
            .map(Node::is_directory)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    /// Adds an empty directory. The parent must already be a directory.
    pub fn create_directory(&mut self, path: &NodePath) -> NamingResult<()> {
        self.insert(Node::directory(path.clone()))
    }

    /// Adds a file whose primary copy lives on `host`.
    pub fn create_file(&mut self, path: &NodePath, host: StorageNodeInfo) -> NamingResult<()> {
        self.insert(Node::file(path.clone(), host))
    }

    fn insert(&mut self, node: Node) -> NamingResult<()> {
        let path = node.path.clone();
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Err(Error::AlreadyExists(path.to_string()));
        };
        let parent_node = self
            .lookup_mut(&parent)
            .ok_or_else(|| Error::NotFound(parent.to_string()))?;

        match &mut parent_node.kind {
            NodeKind::Directory { children } => {
                if children.contains_key(name) {
                    return Err(Error::AlreadyExists(path.to_string()));
                }
                children.insert(name.to_string(), node);
                Ok(())
            }
            NodeKind::File(_) => Err(Error::NotADirectory(parent.to_string())),
        }
    }

    /// Names of the direct children of a directory, in insertion order.
    pub fn list_children(&self, path: &NodePath) -> NamingResult<Vec<String>> {
        let node = self
            .lookup(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        match &node.kind {
            NodeKind::Directory { children } => Ok(children.keys().cloned().collect()),
            NodeKind::File(_) => Err(Error::NotADirectory(path.to_string())),
        }
    }

    pub fn hosting_server(&self, path: &NodePath) -> Option<&StorageNodeInfo> {
        self.file(path).map(|entry| &entry.host)
    }

    pub fn file(&self, path: &NodePath) -> Option<&FileEntry> {
        self.lookup(path).and_then(Node::as_file)
    }

    pub fn file_mut(&mut self, path: &NodePath) -> Option<&mut FileEntry> {
        self.lookup_mut(path).and_then(Node::as_file_mut)
    }

    /// Every file at or below `path`, at any depth.
    pub fn files_under(&self, path: &NodePath) -> NamingResult<Vec<FileTarget>> {
        let node = self
            .lookup(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        let mut files = Vec::new();
        node.collect_files(&mut files);
        Ok(files)
    }

    /// Detaches the node at `path` together with its whole subtree.
    ///
    /// Storage nodes are not contacted here; collect [`PathTree::files_under`]
    /// first and remove the physical copies before detaching.
    pub fn delete(&mut self, path: &NodePath) -> NamingResult<Node> {
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Err(Error::InvalidPath(path.to_string()));
        };
        match self.lookup_mut(&parent).map(|node| &mut node.kind) {
            Some(NodeKind::Directory { children }) => children
                .shift_remove(name)
                .ok_or_else(|| Error::NotFound(path.to_string())),
            _ => Err(Error::NotFound(path.to_string())),
        }
    }
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> NodePath {
        raw.parse().unwrap()
    }

    fn host() -> StorageNodeInfo {
        StorageNodeInfo::new("127.0.0.1", 7000, 7001)
    }

    #[test]
    fn test_root_is_an_empty_directory() {
        let tree = PathTree::new();
        assert!(tree.exists(&NodePath::root()));
        assert_eq!(tree.is_directory(&NodePath::root()), Ok(true));
        assert!(tree.list_children(&NodePath::root()).unwrap().is_empty());
    }

    #[test]
    fn test_create_requires_existing_parent() {
        let mut tree = PathTree::new();
        assert_eq!(
            tree.create_directory(&p("/a/b")),
            Err(Error::NotFound("/a".to_string()))
        );
        assert!(!tree.exists(&p("/a")));

        tree.create_directory(&p("/a")).unwrap();
        tree.create_directory(&p("/a/b")).unwrap();
        assert_eq!(tree.is_directory(&p("/a/b")), Ok(true));
    }

    #[test]
    fn test_names_are_unique_across_kinds() {
        let mut tree = PathTree::new();
        tree.create_file(&p("/x"), host()).unwrap();
        assert_eq!(
            tree.create_directory(&p("/x")),
            Err(Error::AlreadyExists("/x".to_string()))
        );
        assert_eq!(
            tree.create_file(&p("/x"), host()),
            Err(Error::AlreadyExists("/x".to_string()))
        );
        assert_eq!(
            tree.create_directory(&NodePath::root()),
            Err(Error::AlreadyExists("/".to_string()))
        );
    }

    #[test]
    fn test_files_have_no_children() {
        let mut tree = PathTree::new();
        tree.create_file(&p("/f"), host()).unwrap();
        assert_eq!(
            tree.create_file(&p("/f/g"), host()),
            Err(Error::NotADirectory("/f".to_string()))
        );
        assert!(!tree.exists(&p("/f/g")));
        assert_eq!(
            tree.list_children(&p("/f")),
            Err(Error::NotADirectory("/f".to_string()))
        );
    }

    #[test]
    fn test_listing_keeps_insertion_order() {
        let mut tree = PathTree::new();
        for name in ["zeta", "alpha", "mid"] {
            tree.create_directory(&NodePath::root().join(name)).unwrap();
        }
        assert_eq!(
            tree.list_children(&NodePath::root()).unwrap(),
            ["zeta", "alpha", "mid"]
        );

        tree.delete(&p("/alpha")).unwrap();
        assert_eq!(tree.list_children(&NodePath::root()).unwrap(), ["zeta", "mid"]);
    }

    #[test]
    fn test_files_under_walks_every_depth() {
        let mut tree = PathTree::new();
        tree.create_directory(&p("/a")).unwrap();
        tree.create_directory(&p("/a/b")).unwrap();
        tree.create_directory(&p("/a/b/c")).unwrap();
        tree.create_file(&p("/a/one"), host()).unwrap();
        tree.create_file(&p("/a/b/c/deep"), host()).unwrap();

        let files: Vec<String> = tree
            .files_under(&p("/a"))
            .unwrap()
            .into_iter()
            .map(|target| target.path.to_string())
            .collect();
        assert_eq!(files, ["/a/b/c/deep", "/a/one"]);
    }

    #[test]
    fn test_delete_detaches_subtree() {
        let mut tree = PathTree::new();
        tree.create_directory(&p("/a")).unwrap();
        tree.create_directory(&p("/a/b")).unwrap();
        tree.create_file(&p("/a/b/f"), host()).unwrap();

        let removed = tree.delete(&p("/a")).unwrap();
        assert_eq!(removed.path(), &p("/a"));
        assert!(!tree.exists(&p("/a")));
        assert!(!tree.exists(&p("/a/b/f")));
        assert_eq!(tree.delete(&p("/a")).unwrap_err(), Error::NotFound("/a".to_string()));
        assert!(matches!(tree.delete(&NodePath::root()), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_hosting_server_only_for_files() {
        let mut tree = PathTree::new();
        tree.create_directory(&p("/d")).unwrap();
        tree.create_file(&p("/d/f"), host()).unwrap();
        assert_eq!(tree.hosting_server(&p("/d/f")), Some(&host()));
        assert_eq!(tree.hosting_server(&p("/d")), None);
        assert_eq!(tree.hosting_server(&p("/missing")), None);
        assert_eq!(tree.file(&p("/d/f")).unwrap().access_count, 0);
    }
}
