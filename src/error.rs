//! Error taxonomy shared by the virtual and the OS-backed filesystems.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::core::FileMode;

/// Errors returned by [`FileSystem`](crate::FileSystem) implementations.
#[derive(Debug, Clone, Error)]
pub enum FsError {
    /// A non-directory was addressed as if it had children.
    #[error("ENOTDIR: not a directory: '{path}'")]
    NotADirectory { path: String },

    /// A named entry is absent.
    #[error("ENOENT: file does not exist: '{path}'")]
    DoesNotExist { path: String },

    /// Symlink redirections exceeded the bound.
    #[error("ELOOP: too many links: '{path}'")]
    TooManyLinks { path: String },

    /// A name that is not a directory is used as one by another registration,
    /// or a directory is registered over a non-directory (or vice versa).
    #[error("directory disagreement: '{path}' is registered both as a directory and as a non-directory")]
    TypeConflict { path: String },

    /// A mode carries more than one file type.
    #[error("invalid mode {mode:?}: a file cannot be both a directory and a symlink")]
    InvalidMode { mode: FileMode },

    /// The operation does not apply to this kind of file.
    #[error("file has a bad mode (or operation is not supported on this file): '{path}'")]
    BadFileMode { path: String },

    #[error("not supported: {operation}")]
    NotSupported { operation: String },

    #[error("EEXIST: file already exists: '{path}'")]
    AlreadyExists { path: String },

    #[error("invalid path: '{path}'")]
    InvalidPath { path: String },

    /// A fault attached to a node, passed through unchanged.
    #[error("{0}")]
    Injected(InjectedError),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: Arc<io::Error>,
    },
}

impl FsError {
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory { path: path.into() }
    }

    pub fn does_not_exist(path: impl Into<String>) -> Self {
        Self::DoesNotExist { path: path.into() }
    }

    pub fn too_many_links(path: impl Into<String>) -> Self {
        Self::TooManyLinks { path: path.into() }
    }

    pub fn type_conflict(path: impl Into<String>) -> Self {
        Self::TypeConflict { path: path.into() }
    }

    pub fn bad_file_mode(path: impl Into<String>) -> Self {
        Self::BadFileMode { path: path.into() }
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Maps an OS error onto the taxonomy, keeping the kinds the emulator can
    /// also produce.
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::DoesNotExist { path },
            io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::Io {
                path,
                source: Arc::new(err),
            },
        }
    }

    /// Returns the injected fault, if this error is one.
    pub fn injected(&self) -> Option<&InjectedError> {
        match self {
            Self::Injected(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InjectedError> for FsError {
    fn from(e: InjectedError) -> Self {
        Self::Injected(e)
    }
}

/// Convert FsError to std::io::Error so it can cross `Read` boundaries.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        let kind = match &e {
            FsError::NotADirectory { .. } => io::ErrorKind::NotADirectory,
            FsError::DoesNotExist { .. } => io::ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            FsError::InvalidPath { .. } | FsError::InvalidMode { .. } => {
                io::ErrorKind::InvalidInput
            }
            FsError::NotSupported { .. } => io::ErrorKind::Unsupported,
            FsError::Injected(injected) => match injected.downcast_ref::<io::Error>() {
                Some(inner) => inner.kind(),
                None => io::ErrorKind::Other,
            },
            FsError::Io { source, .. } => source.kind(),
            FsError::TooManyLinks { .. }
            | FsError::TypeConflict { .. }
            | FsError::BadFileMode { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

/// A fault attached to a node to simulate a filesystem failure.
///
/// Cloning shares the underlying error, so the value returned by a failed
/// resolution is the very error that was injected (see [`InjectedError::ptr_eq`]).
#[derive(Clone)]
pub struct InjectedError(Arc<dyn StdError + Send + Sync>);

impl InjectedError {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self(Arc::from(err.into()))
    }

    /// True if both values share the same injected error.
    pub fn ptr_eq(&self, other: &InjectedError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for InjectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InjectedError").field(&self.0).finish()
    }
}

impl fmt::Display for InjectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for InjectedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_clone_shares_identity() {
        let injected = InjectedError::new("disk on fire");
        let other = InjectedError::new("disk on fire");

        assert!(injected.ptr_eq(&injected.clone()));
        assert!(!injected.ptr_eq(&other));
        assert_eq!(injected.to_string(), "disk on fire");
    }

    #[test]
    fn test_injected_io_error_keeps_kind() {
        let injected = InjectedError::new(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        let err: io::Error = FsError::from(injected).into();

        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_from_io_maps_known_kinds() {
        let err = FsError::from_io("/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, FsError::DoesNotExist { ref path } if path == "/x"));

        let err = FsError::from_io("/x", io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(matches!(err, FsError::AlreadyExists { .. }));

        let err = FsError::from_io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, FsError::Io { .. }));
        assert_eq!(io::Error::from(err).kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_messages() {
        assert!(
            FsError::does_not_exist("/missing")
                .to_string()
                .contains("does not exist")
        );
        assert!(
            FsError::not_a_directory("/file")
                .to_string()
                .contains("not a directory")
        );
        assert!(FsError::too_many_links("/x").to_string().contains("too many links"));
    }
}
