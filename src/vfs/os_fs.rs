//! This module provides the production [`FileSystem`]: every call goes straight to the host
//! through `std::fs`.

use std::fs::{self, DirBuilder, File, Metadata, ReadDir};
use std::io::{self, Read};
use std::path::Path;

use tracing::trace;

use crate::core::{FileDescriptor, FileInfo, FileMode, FileSystem, Result};
use crate::error::FsError;

/// A [`FileSystem`] that delegates to the operating system.
///
/// Relative paths are resolved against the process working directory. Errors the
/// virtual filesystem can also produce (missing entry, not a directory, already exists)
/// are mapped onto the same [`FsError`] variants; everything else is reported as
/// [`FsError::Io`].
///
/// ### Example
///
/// ```no_run
/// use mockfs_kit::{FileMode, FileSystem, OsFileSystem};
///
/// let mut fs = OsFileSystem::new();
/// fs.mkdir_all("/tmp/mockfs/a/b", FileMode::perm(0o755)).unwrap();
/// assert!(fs.stat("/tmp/mockfs/a/b").unwrap().is_dir());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl OsFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for OsFileSystem {
    fn eval_symlinks(&self, path: &str) -> Result<String> {
        let canonical = fs::canonicalize(path).map_err(|e| FsError::from_io(path, e))?;
        canonical
            .into_os_string()
            .into_string()
            .map_err(|os| FsError::invalid_path(os.to_string_lossy()))
    }

    fn mkdir(&mut self, path: &str, perm: FileMode) -> Result<()> {
        trace!("mkdir '{}' on host", path);
        dir_builder(perm)
            .create(path)
            .map_err(|e| FsError::from_io(path, e))
    }

    fn mkdir_all(&mut self, path: &str, perm: FileMode) -> Result<()> {
        trace!("mkdir -p '{}' on host", path);
        dir_builder(perm)
            .recursive(true)
            .create(path)
            .map_err(|e| match e.kind() {
                // an existing non-directory in the way
                io::ErrorKind::AlreadyExists => FsError::not_a_directory(path),
                _ => FsError::from_io(path, e),
            })
    }

    fn lstat(&self, path: &str) -> Result<FileInfo> {
        let meta = fs::symlink_metadata(path).map_err(|e| FsError::from_io(path, e))?;
        Ok(file_info(Path::new(path), &meta))
    }

    fn open(&self, path: &str) -> Result<Box<dyn FileDescriptor + '_>> {
        let file = File::open(path).map_err(|e| FsError::from_io(path, e))?;
        Ok(Box::new(OsFileDescriptor {
            file,
            path: path.to_string(),
            entries: None,
        }))
    }

    fn stat(&self, path: &str) -> Result<FileInfo> {
        let meta = fs::metadata(path).map_err(|e| FsError::from_io(path, e))?;
        Ok(file_info(Path::new(path), &meta))
    }
}

/// Handle returned by [`OsFileSystem::open`].
///
/// Directory listings are read lazily and in the order the OS returns them.
pub struct OsFileDescriptor {
    file: File,
    path: String,
    entries: Option<ReadDir>,
}

impl Read for OsFileDescriptor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl FileDescriptor for OsFileDescriptor {
    fn read_dir(&mut self, n: isize) -> Result<Vec<FileInfo>> {
        let meta = self
            .file
            .metadata()
            .map_err(|e| FsError::from_io(&self.path, e))?;
        if !meta.is_dir() {
            return Err(FsError::bad_file_mode(&self.path));
        }

        if self.entries.is_none() {
            let entries = fs::read_dir(&self.path).map_err(|e| FsError::from_io(&self.path, e))?;
            self.entries = Some(entries);
        }
        let Some(entries) = self.entries.as_mut() else {
            return Ok(Vec::new());
        };

        let limit = if n > 0 { n as usize } else { usize::MAX };
        let mut infos = Vec::new();
        for entry in entries.take(limit) {
            let entry = entry.map_err(|e| FsError::from_io(&self.path, e))?;
            let child = entry.path();
            let meta = fs::symlink_metadata(&child)
                .map_err(|e| FsError::from_io(child.to_string_lossy(), e))?;
            infos.push(file_info(&child, &meta));
        }
        Ok(infos)
    }
}

fn dir_builder(perm: FileMode) -> DirBuilder {
    #[allow(unused_mut)]
    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode((perm & FileMode::PERM).bits());
    }
    #[cfg(not(unix))]
    let _ = perm;
    builder
}

fn file_info(path: &Path, meta: &Metadata) -> FileInfo {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string());
    FileInfo::new(name, file_mode(meta), meta.len())
}

fn file_mode(meta: &Metadata) -> FileMode {
    let file_type = meta.file_type();
    let kind = if file_type.is_dir() {
        FileMode::DIR
    } else if file_type.is_symlink() {
        FileMode::SYMLINK
    } else {
        FileMode::empty()
    };
    kind | permissions(meta)
}

#[cfg(unix)]
fn permissions(meta: &Metadata) -> FileMode {
    use std::os::unix::fs::PermissionsExt;
    FileMode::perm(meta.permissions().mode())
}

#[cfg(not(unix))]
fn permissions(meta: &Metadata) -> FileMode {
    if meta.permissions().readonly() {
        FileMode::perm(0o444)
    } else {
        FileMode::perm(0o666)
    }
}
