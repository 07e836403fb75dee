use std::io::Read;

use crate::error::FsError;

pub type Result<T> = std::result::Result<T, FsError>;

/// Abstraction of the filesystem calls that production code needs, so that tests can swap
/// the operating system for a [`VirtualFileSystem`](crate::VirtualFileSystem).
///
/// Paths are `/`-separated strings. Relative paths are interpreted by the implementation
/// (the OS working directory, or the virtual filesystem's `cwd` prefix).
pub trait FileSystem {
    /// Returns the canonical absolute path of `path` with every symlink resolved.
    fn eval_symlinks(&self, path: &str) -> Result<String>;

    /// Creates a single directory. The parent must exist and `path` must not.
    fn mkdir(&mut self, path: &str, perm: FileMode) -> Result<()>;

    /// Creates a directory and every missing parent.
    /// Succeeds without changes if `path` is already a directory.
    fn mkdir_all(&mut self, path: &str, perm: FileMode) -> Result<()>;

    /// Returns file information without following a symlink in the final position.
    fn lstat(&self, path: &str) -> Result<FileInfo>;

    /// Opens `path` for reading, following symlinks.
    fn open(&self, path: &str) -> Result<Box<dyn FileDescriptor + '_>>;

    /// Returns file information, following symlinks.
    fn stat(&self, path: &str) -> Result<FileInfo>;
}

/// An open file or directory.
pub trait FileDescriptor: Read {
    /// Lists directory entries.
    /// * `n <= 0` returns every remaining entry.
    /// * `n > 0` asks for at most `n` entries; backends that cannot page return
    ///   [`FsError::NotSupported`].
    fn read_dir(&mut self, n: isize) -> Result<Vec<FileInfo>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

bitflags::bitflags! {
    /// File type and permission bits.
    ///
    /// A mode without type bits describes a regular file. The low nine bits are
    /// permissions; they are carried around but never enforced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileMode: u32 {
        const DIR = 1 << 31;
        const SYMLINK = 1 << 27;
        const TYPE = Self::DIR.bits() | Self::SYMLINK.bits();
        const PERM = 0o777;
    }
}

impl FileMode {
    /// Permission bits only, taken from `bits & 0o777`.
    pub fn perm(bits: u32) -> FileMode {
        FileMode::from_bits_truncate(bits & 0o777)
    }

    pub fn is_dir(&self) -> bool {
        self.contains(FileMode::DIR)
    }

    pub fn is_symlink(&self) -> bool {
        self.contains(FileMode::SYMLINK)
    }

    pub fn is_regular(&self) -> bool {
        !self.intersects(FileMode::TYPE)
    }

    /// Returns the entry type, or `None` if more than one type bit is set.
    pub fn entry_type(&self) -> Option<EntryType> {
        match (self.is_dir(), self.is_symlink()) {
            (false, false) => Some(EntryType::File),
            (true, false) => Some(EntryType::Directory),
            (false, true) => Some(EntryType::Symlink),
            (true, true) => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

/// Snapshot of the attributes of a file, directory or symlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    name: String,
    mode: FileMode,
    size: u64,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, mode: FileMode, size: u64) -> FileInfo {
        FileInfo {
            name: name.into(),
            mode,
            size,
        }
    }

    /// Base name of the entry (`/` for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.mode.is_regular()
    }

    pub fn is_symlink(&self) -> bool {
        self.mode.is_symlink()
    }
}

pub mod utils {
    /// Returns true if `b` is a forward or a backward slash.
    pub fn is_path_separator_windows(b: u8) -> bool {
        b == b'/' || b == b'\\'
    }

    /// Joins `cwd` and `path` unless `path` is already absolute.
    /// `cwd` is expected to end with `/`.
    pub fn absolutize(cwd: &str, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{cwd}{path}")
        }
    }

    /// Iterates over the non-empty components of a `/`-separated path.
    pub fn components(path: &str) -> impl Iterator<Item = &str> {
        path.split('/').filter(|c| !c.is_empty())
    }

    /// Panics on the `.` and `..` components. Paths handed to the virtual filesystem must
    /// already be clean; anything else is a bug in the test setup.
    pub fn validate_name(name: &str) {
        if name == "." || name == ".." {
            panic!(
                "invalid name component {name:?}: paths must not have a component that is one of '.' and '..'"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::utils::*;
    use super::*;

    #[test]
    fn test_mode_entry_type() {
        assert_eq!(FileMode::empty().entry_type(), Some(EntryType::File));
        assert_eq!(FileMode::perm(0o644).entry_type(), Some(EntryType::File));
        assert_eq!(FileMode::DIR.entry_type(), Some(EntryType::Directory));
        assert_eq!(FileMode::SYMLINK.entry_type(), Some(EntryType::Symlink));
        assert_eq!(FileMode::TYPE.entry_type(), None);
    }

    #[test]
    fn test_mode_perm_drops_type_bits() {
        let mode = FileMode::perm(0o40755);
        assert!(mode.is_regular());
        assert_eq!(mode.bits(), 0o755);
    }

    #[test]
    fn test_is_path_separator_windows() {
        assert!(is_path_separator_windows(b'/'));
        assert!(is_path_separator_windows(b'\\'));
        assert!(!is_path_separator_windows(b':'));
        assert!(!is_path_separator_windows(b'a'));
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize("/", "a/b"), "/a/b");
        assert_eq!(absolutize("/work/", "a"), "/work/a");
        assert_eq!(absolutize("/work/", "/etc"), "/etc");
        assert_eq!(absolutize("/work/", ""), "/work/");
    }

    #[test]
    fn test_components_skip_empty() {
        let parts: Vec<_> = components("/a//b/c/").collect();
        assert_eq!(parts, vec!["a", "b", "c"]);
        assert_eq!(components("/").count(), 0);
    }

    #[test]
    #[should_panic(expected = "invalid name component")]
    fn test_validate_name_dot_dot() {
        validate_name("..");
    }
}
