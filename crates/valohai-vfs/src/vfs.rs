use crate::archive::{ArchiveHandle, ArchiveKind};
use crate::cleanup::CleanupStack;
use crate::error::VfsResult;
use crate::file::{ContainerEntry, DiskFile, VirtualFile};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const FILTER_OPTIONS: MatchOptions =
    MatchOptions { case_sensitive: true, require_literal_separator: true, require_literal_leading_dot: false };

/// A flat, ordered view over disk files and archive entries.
///
/// The VFS owns the archives it opens and the temp files it materializes.
/// Both are released when it is closed or dropped, including during unwinding.
/// Materializations requested with `delete = false` are left in place.
#[derive(Debug, Default)]
pub struct Vfs {
    files: Vec<VirtualFile>,
    cleanup: Arc<CleanupStack>,
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[VirtualFile] {
        &self.files
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VirtualFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Register a top-level file.
    ///
    /// With `process_archives`, a recognized archive contributes its regular
    /// entries instead of itself. Expansion is one level deep.
    pub fn add_disk_file(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        process_archives: bool,
    ) -> VfsResult<()> {
        let disk_file = DiskFile::new(name, path);
        let kind = if process_archives { ArchiveKind::from_name(disk_file.name()) } else { None };
        let Some(kind) = kind else {
            self.files.push(VirtualFile::Disk(disk_file));
            return Ok(());
        };

        let (handle, entries) = ArchiveHandle::open(disk_file.path(), kind)?;
        self.cleanup.push_archive(Arc::clone(&handle));
        let parent = Arc::new(disk_file);
        self.files.extend(entries.into_iter().map(|entry| {
            VirtualFile::Entry(ContainerEntry::new(
                Arc::clone(&parent),
                Arc::clone(&handle),
                entry.path_in_archive,
                entry.locator,
                Arc::clone(&self.cleanup),
            ))
        }));
        Ok(())
    }

    /// Register every regular file below `root`, named by its path relative to `root`.
    pub fn find_files(&mut self, root: &Path, process_archives: bool) -> VfsResult<()> {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = relative_name(root, entry.path());
            self.add_disk_file(name, entry.path(), process_archives)?;
        }
        Ok(())
    }

    /// Files whose logical name matches a glob pattern.
    ///
    /// `*` stays within one path segment and `**` spans segments.
    pub fn filter(&self, pattern: &str) -> VfsResult<Vec<&VirtualFile>> {
        let pattern = Pattern::new(pattern)?;
        Ok(self.files.iter().filter(|f| pattern.matches_with(f.name(), FILTER_OPTIONS)).collect())
    }

    /// Release archives and remove non-kept temp files now, reporting failures.
    pub fn close(self) -> VfsResult<()> {
        Ok(self.cleanup.run()?)
    }
}

impl Drop for Vfs {
    fn drop(&mut self) {
        // Entries hold the cleanup stack too; drop them first so nothing re-registers.
        self.files.clear();
        if let Err(e) = self.cleanup.run() {
            tracing::warn!(error = %e, "vfs cleanup failed");
        }
    }
}

impl<'a> IntoIterator for &'a Vfs {
    type Item = &'a VirtualFile;
    type IntoIter = std::slice::Iter<'a, VirtualFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}
