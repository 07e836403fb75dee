use std::io;

use crate::core::{FileDescriptor, FileInfo, Result};
use crate::error::FsError;
use crate::vfs::node::{NodeId, Tree};

/// Handle returned by [`VirtualFileSystem::open`](crate::VirtualFileSystem).
///
/// Borrows the tree, so the filesystem cannot be modified while a handle is alive.
/// Closing releases nothing.
pub struct VirtualFileDescriptor<'a> {
    tree: &'a Tree,
    node: NodeId,
    path: String,
    read_pos: usize,
    dir_pos: usize,
}

impl<'a> VirtualFileDescriptor<'a> {
    pub(crate) fn new(tree: &'a Tree, node: NodeId, path: String) -> Self {
        Self {
            tree,
            node,
            path,
            read_pos: 0,
            dir_pos: 0,
        }
    }

    /// Attributes of the opened entry.
    pub fn info(&self) -> FileInfo {
        self.tree.node(self.node).info()
    }
}

impl io::Read for VirtualFileDescriptor<'_> {
    /// Reads from the current position. Returns `Ok(0)` at the end of the content, as many
    /// times as asked. Fails with `BadFileMode` if the entry is not a regular file.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let content = self
            .tree
            .node(self.node)
            .content()
            .ok_or_else(|| FsError::bad_file_mode(&self.path))?;
        let rest = &content[self.read_pos.min(content.len())..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl FileDescriptor for VirtualFileDescriptor<'_> {
    fn read_dir(&mut self, n: isize) -> Result<Vec<FileInfo>> {
        let node = self.tree.node(self.node);
        if !node.is_dir() {
            return Err(FsError::bad_file_mode(&self.path));
        }
        if n > 0 {
            return Err(FsError::not_supported(format!(
                "bounded directory listing of '{}'",
                self.path
            )));
        }
        let children = &node.children()[self.dir_pos.min(node.children().len())..];
        self.dir_pos += children.len();
        Ok(children
            .iter()
            .map(|&child| self.tree.node(child).info())
            .collect())
    }
}
