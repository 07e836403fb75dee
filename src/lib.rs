//! An in-memory filesystem double for Rust, with symlinks and fault injection.
//! Lets code that touches the filesystem be tested without touching the disk.
//!
//! ### Overview
//!
//! `mockfs-kit` defines the [`FileSystem`] trait, the small set of calls production code
//! usually needs (`open`, `stat`, `lstat`, `eval_symlinks`, `mkdir`, `mkdir_all`), and two
//! implementations:
//! - [`OsFileSystem`] forwards every call to the operating system.
//! - [`VirtualFileSystem`] keeps a tree of files, directories and symlinks in memory.
//!
//! **Key ideas**:
//! - **Interchangeability**: Code written against `&dyn FileSystem` runs on either implementation.
//! - **Symlinks**: Relative and absolute links are resolved on every access, with loop detection.
//! - **Fault injection**: Any entry can carry an [`InjectedError`]; every operation whose walk
//!   reaches that entry fails with it.
//! - **Declarative setup**: A whole tree is built from `(path, VirtualFile)` pairs in any order.
//!
//! The [`progress`] module tracks container image pull and push progress streams.

mod core;
mod error;
pub mod progress;
mod vfs;

pub use crate::core::utils::is_path_separator_windows;
pub use crate::core::{EntryType, FileDescriptor, FileInfo, FileMode, FileSystem, Result};
pub use error::{FsError, InjectedError};
pub use vfs::{
    MAX_LINKS, OsFileDescriptor, OsFileSystem, VirtualFile, VirtualFileDescriptor,
    VirtualFileSystem,
};
