//! Valohai VFS
//!
//! A uniform file abstraction over:
//! - Plain files on disk
//! - Regular entries inside zip archives
//! - Regular entries inside tar archives (plain, gzip, bzip2 or xz compressed)
//!
//! Archive entries can be streamed in place or materialized into temp files
//! on demand; the owning [`Vfs`] cleans those up when it goes out of scope.

pub mod archive;
mod cleanup;
pub mod error;
pub mod file;
mod vfs;

pub use archive::{ArchiveKind, TarCompression};
pub use error::{VfsError, VfsResult};
pub use file::{ConcreteFile, ContainerEntry, DiskFile, VirtualFile};
pub use vfs::Vfs;
