mod build;
mod descriptor;
mod node;
mod os_fs;
mod resolve;
mod virtual_fs;

pub use build::VirtualFile;
pub use descriptor::VirtualFileDescriptor;
pub use os_fs::{OsFileDescriptor, OsFileSystem};
pub use resolve::MAX_LINKS;
pub use virtual_fs::VirtualFileSystem;
