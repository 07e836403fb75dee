//! Grafting of virtual files into the node tree.

use tracing::debug;

use crate::core::utils::{components, validate_name};
use crate::core::{EntryType, FileMode, Result};
use crate::error::{FsError, InjectedError};
use crate::vfs::node::{Node, NodeId, Payload, Tree};
use crate::vfs::resolve::{Policy, resolve};

/// Describes a file, directory or symlink to place in a
/// [`VirtualFileSystem`](crate::VirtualFileSystem).
///
/// If `error` is set, every checked operation that reaches the entry fails with it.
/// For a regular file `content` is the file content; for a symlink it is the link target.
/// Directories ignore `content`.
#[derive(Debug, Clone, Default)]
pub struct VirtualFile {
    pub content: Vec<u8>,
    pub mode: FileMode,
    pub error: Option<InjectedError>,
}

impl VirtualFile {
    pub fn file(content: impl Into<Vec<u8>>) -> VirtualFile {
        VirtualFile {
            content: content.into(),
            mode: FileMode::perm(0o644),
            error: None,
        }
    }

    pub fn dir() -> VirtualFile {
        VirtualFile {
            content: Vec::new(),
            mode: FileMode::DIR | FileMode::perm(0o755),
            error: None,
        }
    }

    /// A symlink to `target`. Targets are strings; a `content` set by hand that is not valid
    /// UTF-8 is decoded lossily when the node is created.
    pub fn symlink(target: impl Into<String>) -> VirtualFile {
        VirtualFile {
            content: target.into().into_bytes(),
            mode: FileMode::SYMLINK | FileMode::perm(0o777),
            error: None,
        }
    }

    pub fn with_error(mut self, error: InjectedError) -> VirtualFile {
        self.error = Some(error);
        self
    }

    pub fn with_mode(mut self, mode: FileMode) -> VirtualFile {
        self.mode = mode;
        self
    }

    /// Entry type declared by `mode`.
    ///
    /// # Panics
    /// If `mode` declares more than one type. A descriptor like that is a bug in the
    /// caller, not a runtime condition.
    pub fn entry_type(&self) -> EntryType {
        match self.mode.entry_type() {
            Some(entry_type) => entry_type,
            None => panic!("{}", FsError::InvalidMode { mode: self.mode }),
        }
    }

    fn to_node(&self, name: &str, entry_type: EntryType) -> Node {
        Node {
            name: name.to_string(),
            mode: self.mode,
            error: self.error.clone(),
            payload: Payload::new(entry_type, &self.content),
        }
    }
}

/// Sets or updates the entry at the absolute `path`.
///
/// * Missing parents are created as plain directories.
/// * An existing entry of the same kind (directory vs. non-directory) gets its mode,
///   injected error and, for non-directories, payload replaced. Directories keep their children.
/// * `TypeConflict` is returned if a parent is not a directory, or if an existing entry and
///   `vfile` disagree about being a directory. The tree is left untouched in that case.
///
/// # Panics
/// On an invalid mode (see [`VirtualFile::entry_type`]) or a `.`/`..` component.
pub(crate) fn set(tree: &mut Tree, path: &str, vfile: &VirtualFile) -> Result<()> {
    let entry_type = vfile.entry_type();

    let walk = resolve(tree, path, Policy::BUILD);
    match walk.outcome {
        Ok(()) | Err(FsError::DoesNotExist { .. }) => {}
        Err(FsError::NotADirectory { .. }) => return Err(FsError::type_conflict(path)),
        Err(e) => return Err(e),
    }

    if walk.remainder.is_empty() {
        update(tree, walk.node, path, vfile, entry_type)
    } else {
        create_children(
            tree,
            walk.node,
            &walk.remainder,
            vfile,
            entry_type,
            FileMode::empty(),
        );
        Ok(())
    }
}

fn update(
    tree: &mut Tree,
    id: NodeId,
    path: &str,
    vfile: &VirtualFile,
    entry_type: EntryType,
) -> Result<()> {
    let node = tree.node_mut(id);
    let is_dir = entry_type == EntryType::Directory;
    if node.is_dir() != is_dir {
        return Err(FsError::type_conflict(path));
    }

    debug!("updating '{}' with mode {:?}", path, vfile.mode);
    node.mode = vfile.mode;
    node.error = vfile.error.clone();
    if !is_dir {
        node.payload = Payload::new(entry_type, &vfile.content);
    }
    Ok(())
}

/// Creates the components of `remainder` below the directory `dir`: directories with
/// `parent_mode` for all but the last one, and a node described by `vfile` for the last one.
/// Returns the id of the last node.
pub(crate) fn create_children(
    tree: &mut Tree,
    dir: NodeId,
    remainder: &str,
    vfile: &VirtualFile,
    entry_type: EntryType,
    parent_mode: FileMode,
) -> NodeId {
    let names: Vec<&str> = components(remainder).collect();
    names.iter().for_each(|name| validate_name(name));

    let mut parent = dir;
    for (i, name) in names.iter().enumerate() {
        let child = if i + 1 == names.len() {
            vfile.to_node(name, entry_type)
        } else {
            Node::directory(*name, parent_mode)
        };
        debug!(
            "creating '{}' ({:?}) below '{}'",
            name,
            child.mode,
            tree.node(parent).name
        );
        parent = tree.append(parent, child);
    }
    parent
}
