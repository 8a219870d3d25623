//! File handles exposed by the VFS.

use crate::archive::{self, ArchiveHandle, ArchiveKind, EntryLocator};
use crate::cleanup::CleanupStack;
use crate::error::{VfsError, VfsResult};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A plain file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskFile {
    name: String,
    path: PathBuf,
}

impl DiskFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> VfsResult<File> {
        Ok(File::open(&self.path)?)
    }

    /// Stable temp directory under which entries of this archive are materialized.
    ///
    /// Siblings share the directory, so removing it clears every extraction at once.
    pub fn container_temp_root(&self) -> PathBuf {
        let digest = Sha256::digest(self.path.to_string_lossy().as_bytes());
        let short = &hex::encode(digest)[..40];
        std::env::temp_dir().join(format!("vh-vfs-{short}"))
    }
}

/// A regular file stored inside a zip or tar archive.
#[derive(Debug)]
pub struct ContainerEntry {
    name: String,
    path_in_container: String,
    parent: Arc<DiskFile>,
    archive: Arc<ArchiveHandle>,
    locator: EntryLocator,
    concrete_path: Mutex<Option<PathBuf>>,
    cleanup: Arc<CleanupStack>,
}

impl ContainerEntry {
    pub(crate) fn new(
        parent: Arc<DiskFile>,
        archive: Arc<ArchiveHandle>,
        path_in_container: String,
        locator: EntryLocator,
        cleanup: Arc<CleanupStack>,
    ) -> Self {
        let name = join_logical(parent.name(), &path_in_container);
        Self { name, path_in_container, parent, archive, locator, concrete_path: Mutex::new(None), cleanup }
    }

    /// Logical name: the parent archive's logical directory plus the in-archive path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry's path exactly as stored in the archive.
    pub fn path_in_container(&self) -> &str {
        &self.path_in_container
    }

    /// The archive file this entry lives in.
    pub fn parent(&self) -> &DiskFile {
        &self.parent
    }

    pub fn archive_kind(&self) -> ArchiveKind {
        self.archive.kind()
    }

    pub fn open(&self) -> VfsResult<Box<dyn Read + Send>> {
        archive::open_entry(&self.archive, self.locator)
    }

    /// Copy the entry's bytes into `destination`.
    pub fn extract_to(&self, destination: &mut impl Write) -> VfsResult<u64> {
        let mut source = self.open()?;
        Ok(io::copy(&mut source, destination)?)
    }

    /// Path of the most recent materialization, if it still exists.
    pub fn materialized_path(&self) -> Option<PathBuf> {
        self.lock_concrete().ok()?.clone().filter(|p| p.is_file())
    }

    /// Materialize the entry as a standalone file and open it.
    ///
    /// The extraction is cached: later calls reopen the same file while it
    /// exists. With `delete` the file is removed when the returned handle
    /// drops; otherwise it survives both the handle and the owning VFS.
    pub fn open_concrete(&self, delete: bool) -> VfsResult<ConcreteFile> {
        let mut cached = self.lock_concrete()?;
        if let Some(path) = cached.as_ref().filter(|p| p.is_file()) {
            if !delete {
                self.cleanup.keep(path);
            }
            return Ok(ConcreteFile { file: File::open(path)?, path: path.clone(), delete_on_drop: None });
        }

        let root = self.parent.container_temp_root();
        let path = root.join(safe_relative(&self.path_in_container));
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path)?;
        self.extract_to(&mut file)?;
        file.flush()?;
        file.seek(SeekFrom::Start(0))?;

        tracing::debug!(entry = %self.name, path = %path.display(), keep = !delete, "materialized archive entry");
        self.cleanup.push_materialized(path.clone(), root, !delete);
        *cached = Some(path.clone());
        let delete_on_drop = delete.then(|| Arc::clone(&self.cleanup));
        Ok(ConcreteFile { file, path, delete_on_drop })
    }

    fn lock_concrete(&self) -> VfsResult<std::sync::MutexGuard<'_, Option<PathBuf>>> {
        self.concrete_path.lock().map_err(|_| VfsError::Poisoned(self.name.clone()))
    }
}

/// A materialized archive entry, readable through the OS.
#[derive(Debug)]
pub struct ConcreteFile {
    file: File,
    path: PathBuf,
    /// Set for a deleting handle; a path kept through the stack is never removed.
    delete_on_drop: Option<Arc<CleanupStack>>,
}

impl ConcreteFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the handle and keep the file on disk.
    pub fn into_path(mut self) -> PathBuf {
        if let Some(cleanup) = self.delete_on_drop.take() {
            cleanup.keep(&self.path);
        }
        self.path.clone()
    }
}

impl Read for ConcreteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for ConcreteFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Drop for ConcreteFile {
    fn drop(&mut self) {
        let Some(cleanup) = self.delete_on_drop.take() else {
            return;
        };
        if cleanup.is_kept(&self.path) {
            tracing::debug!(path = %self.path.display(), "materialized file is kept; not removing");
        } else if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "materialized file already gone");
        }
    }
}

/// Any file the VFS knows about.
#[derive(Debug)]
pub enum VirtualFile {
    Disk(DiskFile),
    Entry(ContainerEntry),
}

impl VirtualFile {
    pub fn name(&self) -> &str {
        match self {
            Self::Disk(f) => f.name(),
            Self::Entry(f) => f.name(),
        }
    }

    /// Final extension of the logical name including the dot, or `""`.
    pub fn extension(&self) -> String {
        Path::new(self.name())
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn is_container_entry(&self) -> bool {
        matches!(self, Self::Entry(_))
    }

    /// The archive an entry came from; `None` for plain disk files.
    pub fn parent(&self) -> Option<&DiskFile> {
        match self {
            Self::Disk(_) => None,
            Self::Entry(f) => Some(f.parent()),
        }
    }

    /// On-disk path for plain files.
    pub fn disk_path(&self) -> Option<&Path> {
        match self {
            Self::Disk(f) => Some(f.path()),
            Self::Entry(_) => None,
        }
    }

    pub fn open(&self) -> VfsResult<Box<dyn Read + Send>> {
        match self {
            Self::Disk(f) => Ok(Box::new(f.open()?)),
            Self::Entry(f) => f.open(),
        }
    }

    pub fn read(&self) -> VfsResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// A path on disk that stays valid after the VFS closes.
    ///
    /// Plain files return their own path; archive entries are materialized and kept.
    pub fn concrete_path(&self) -> VfsResult<PathBuf> {
        match self {
            Self::Disk(f) => Ok(f.path().to_path_buf()),
            Self::Entry(f) => Ok(f.open_concrete(false)?.into_path()),
        }
    }
}

fn join_logical(parent_name: &str, inner: &str) -> String {
    match parent_name.rfind('/') {
        Some(idx) => format!("{}/{}", &parent_name[..idx], inner),
        None => inner.to_string(),
    }
}

/// Relative path usable under a temp root; `..`, root and prefix components are dropped.
fn safe_relative(path_in_container: &str) -> PathBuf {
    Path::new(path_in_container)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}
