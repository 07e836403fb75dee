//! This module provides the in-memory filesystem double: a tree of files, directories and
//! symlinks that never touches the disk and can be told to fail at chosen paths.

use tracing::debug;

use crate::core::utils::{absolutize, components};
use crate::core::{EntryType, FileDescriptor, FileInfo, FileMode, FileSystem, Result};
use crate::error::FsError;
use crate::vfs::build::{self, VirtualFile};
use crate::vfs::descriptor::VirtualFileDescriptor;
use crate::vfs::node::Tree;
use crate::vfs::resolve::{Policy, Walk, resolve};

/// A [`FileSystem`] kept entirely in memory, meant to stand in for the real filesystem in tests.
///
/// ### Internal state
///
/// * `cwd`: a fixed prefix joined to every relative path. It always starts and ends with `/`.
///   There is no `cd`: the prefix only absolutizes paths.
/// * `tree`: the nodes. The root is a directory named `/`. Every other node is reachable
///   from it through directory contents only; symlinks are target strings resolved on
///   every access.
///
/// ### Fault injection
///
/// Any entry can carry an [`InjectedError`](crate::InjectedError). `open`, `stat`, `lstat`,
/// `eval_symlinks`, `mkdir` and `mkdir_all` fail with that error as soon as their walk reaches
/// the entry, whether it is the target or one of its parents. `set` ignores faults.
///
/// ### Thread Safety
///
/// Not thread-safe and not meant to be: mutation takes `&mut self`. Build one instance per
/// test, or serialize access at the application level.
///
/// ### Example
///
/// ```
/// use std::io::Read;
/// use mockfs_kit::{FileSystem, VirtualFile, VirtualFileSystem};
///
/// let fs = VirtualFileSystem::new([
///     ("/dir/file.txt", VirtualFile::file("hello")),
///     ("/dir/link", VirtualFile::symlink("file.txt")),
/// ])
/// .unwrap();
///
/// assert!(fs.stat("/dir").unwrap().is_dir());
///
/// let mut content = String::new();
/// fs.open("/dir/link").unwrap().read_to_string(&mut content).unwrap();
/// assert_eq!(content, "hello");
/// ```
#[derive(Debug, Clone)]
pub struct VirtualFileSystem {
    cwd: String,
    tree: Tree,
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self {
            cwd: "/".to_string(),
            tree: Tree::new(),
        }
    }
}

impl VirtualFileSystem {
    /// Creates a filesystem holding `data`, applying [`set`](Self::set) to every entry.
    /// Entries may come in any order; missing parents are created as directories.
    ///
    /// Returns `TypeConflict` if two entries disagree on whether some path is a directory.
    pub fn new<I, P>(data: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, VirtualFile)>,
        P: AsRef<str>,
    {
        let mut fs = Self::default();
        for (path, vfile) in data {
            fs.set(path.as_ref(), vfile)?;
        }
        Ok(fs)
    }

    /// Sets or updates the entry at `path`.
    ///
    /// * Missing parents are created as directories without faults.
    /// * If an entry already exists and both it and `vfile` are directories (or both are not),
    ///   its mode, injected error, content or symlink target are replaced. A directory keeps
    ///   its entries.
    /// * `TypeConflict` is returned, and nothing changes, if a parent is not a directory or if
    ///   the existing entry and `vfile` disagree on being a directory.
    ///
    /// Symlinks on the path are not followed and injected errors are ignored.
    ///
    /// # Panics
    /// If `vfile.mode` is both a directory and a symlink, or if `path` has a `.` or `..`
    /// component.
    pub fn set(&mut self, path: &str, vfile: VirtualFile) -> Result<()> {
        let path = absolutize(&self.cwd, path);
        build::set(&mut self.tree, &path, &vfile)
    }

    /// Returns the prefix used for relative paths.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Changes the prefix used for relative paths.
    /// * `path` must be absolute and free of `.` and `..` components, otherwise
    ///   `InvalidPath` is returned. A trailing `/` is added if missing.
    pub fn set_cwd(&mut self, path: &str) -> Result<()> {
        if !path.starts_with('/') || components(path).any(|c| c == "." || c == "..") {
            return Err(FsError::invalid_path(path));
        }
        self.cwd = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };
        Ok(())
    }

    fn walk(&self, path: &str, policy: Policy) -> (String, Walk) {
        let path = absolutize(&self.cwd, path);
        let walk = resolve(&self.tree, &path, policy);
        (path, walk)
    }
}

impl FileSystem for VirtualFileSystem {
    /// The returned path is always absolute, even for a relative `path`.
    fn eval_symlinks(&self, path: &str) -> Result<String> {
        let (_, walk) = self.walk(path, Policy::FOLLOW);
        let canonical = walk.canonical_path(&self.tree);
        walk.outcome.map(|()| canonical)
    }

    fn mkdir(&mut self, path: &str, perm: FileMode) -> Result<()> {
        let (path, walk) = self.walk(path, Policy::NOFOLLOW_LAST);
        match walk.outcome {
            Ok(()) => Err(FsError::already_exists(path)),
            Err(FsError::DoesNotExist { .. }) if components(&walk.remainder).count() == 1 => {
                debug!("mkdir '{}'", path);
                let mode = FileMode::DIR | (perm & FileMode::PERM);
                let vfile = VirtualFile::dir().with_mode(mode);
                build::create_children(
                    &mut self.tree,
                    walk.node,
                    &walk.remainder,
                    &vfile,
                    EntryType::Directory,
                    mode,
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn mkdir_all(&mut self, path: &str, perm: FileMode) -> Result<()> {
        let (path, walk) = self.walk(path, Policy::FOLLOW);
        match walk.outcome {
            Ok(()) if self.tree.node(walk.node).is_dir() => Ok(()),
            Ok(()) => Err(FsError::not_a_directory(path)),
            Err(FsError::DoesNotExist { .. }) => {
                debug!("mkdir -p '{}' from '{}'", path, walk.remainder);
                let mode = FileMode::DIR | (perm & FileMode::PERM);
                let vfile = VirtualFile::dir().with_mode(mode);
                build::create_children(
                    &mut self.tree,
                    walk.node,
                    &walk.remainder,
                    &vfile,
                    EntryType::Directory,
                    mode,
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn lstat(&self, path: &str) -> Result<FileInfo> {
        let (_, walk) = self.walk(path, Policy::NOFOLLOW_LAST);
        let node = walk.into_node()?;
        Ok(self.tree.node(node).info())
    }

    fn open(&self, path: &str) -> Result<Box<dyn FileDescriptor + '_>> {
        let (path, walk) = self.walk(path, Policy::FOLLOW);
        let node = walk.into_node()?;
        Ok(Box::new(VirtualFileDescriptor::new(&self.tree, node, path)))
    }

    fn stat(&self, path: &str) -> Result<FileInfo> {
        let (_, walk) = self.walk(path, Policy::FOLLOW);
        let node = walk.into_node()?;
        Ok(self.tree.node(node).info())
    }
}
