use crate::core::{EntryType, FileInfo, FileMode};
use crate::error::InjectedError;

/// Index of a node in the arena of a [`Tree`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// Type-specific data of a node. The variant always matches the type bits of the mode.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Payload {
    Directory(Vec<NodeId>),
    File(Vec<u8>),
    Symlink(String),
}

impl Payload {
    /// Builds a fresh payload of type `entry_type`. Directories start empty; `content` is
    /// the file content or the symlink target. A target that is not valid UTF-8 is stored
    /// with the invalid sequences replaced by U+FFFD.
    pub(crate) fn new(entry_type: EntryType, content: &[u8]) -> Payload {
        match entry_type {
            EntryType::Directory => Payload::Directory(Vec::new()),
            EntryType::File => Payload::File(content.to_vec()),
            EntryType::Symlink => Payload::Symlink(String::from_utf8_lossy(content).into_owned()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) mode: FileMode,
    pub(crate) error: Option<InjectedError>,
    pub(crate) payload: Payload,
}

impl Node {
    pub(crate) fn directory(name: impl Into<String>, mode: FileMode) -> Node {
        Node {
            name: name.into(),
            mode: mode | FileMode::DIR,
            error: None,
            payload: Payload::Directory(Vec::new()),
        }
    }

    pub(crate) fn is_dir(&self) -> bool {
        matches!(self.payload, Payload::Directory(_))
    }

    #[cfg(test)]
    pub(crate) fn is_regular(&self) -> bool {
        matches!(self.payload, Payload::File(_))
    }

    pub(crate) fn symlink_target(&self) -> Option<&str> {
        match &self.payload {
            Payload::Symlink(target) => Some(target),
            _ => None,
        }
    }

    pub(crate) fn children(&self) -> &[NodeId] {
        match &self.payload {
            Payload::Directory(children) => children,
            _ => &[],
        }
    }

    pub(crate) fn content(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::File(content) => Some(content),
            _ => None,
        }
    }

    pub(crate) fn size(&self) -> u64 {
        match &self.payload {
            Payload::Directory(_) => 0,
            Payload::File(content) => content.len() as u64,
            Payload::Symlink(target) => target.len() as u64,
        }
    }

    pub(crate) fn info(&self) -> FileInfo {
        FileInfo::new(self.name.clone(), self.mode, self.size())
    }
}

/// Arena owning every node. Nodes refer to their children by id; nothing refers back to
/// a parent and symlinks are plain target strings, so ownership stays a tree.
#[derive(Debug, Clone)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub(crate) const ROOT: NodeId = NodeId(0);

    pub(crate) fn new() -> Tree {
        Tree {
            nodes: vec![Node::directory("/", FileMode::empty())],
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Finds a child of directory `dir` by exact name.
    pub(crate) fn lookup(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.node(dir)
            .children()
            .iter()
            .copied()
            .find(|&child| self.node(child).name == name)
    }

    /// Appends `child` to the directory `dir` and returns its id.
    /// The caller guarantees that `dir` is a directory without a child of the same name.
    pub(crate) fn append(&mut self, dir: NodeId, child: Node) -> NodeId {
        debug_assert!(self.lookup(dir, &child.name).is_none());
        let id = NodeId(self.nodes.len());
        self.nodes.push(child);
        match &mut self.node_mut(dir).payload {
            Payload::Directory(children) => children.push(id),
            _ => unreachable!("append to a non-directory"),
        }
        id
    }
}
