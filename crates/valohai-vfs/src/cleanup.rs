//! Deterministic teardown for a [`Vfs`](crate::Vfs).
//!
//! Actions run last-in first-out when the owning VFS closes or drops.

use crate::archive::ArchiveHandle;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
enum CleanupAction {
    /// Release the VFS's reference to an open archive.
    ReleaseArchive(Arc<ArchiveHandle>),
    /// Remove a materialized temp file, then any directories it leaves empty up to `root`.
    RemoveFile { path: PathBuf, root: PathBuf },
}

#[derive(Debug, Default)]
struct CleanupState {
    actions: Vec<CleanupAction>,
    keep: HashSet<PathBuf>,
}

#[derive(Debug, Default)]
pub(crate) struct CleanupStack {
    state: Mutex<CleanupState>,
}

impl CleanupStack {
    pub(crate) fn push_archive(&self, handle: Arc<ArchiveHandle>) {
        self.with_state(|state| state.actions.push(CleanupAction::ReleaseArchive(handle)));
    }

    pub(crate) fn push_materialized(&self, path: PathBuf, root: PathBuf, keep: bool) {
        self.with_state(|state| {
            if keep {
                state.keep.insert(path.clone());
            }
            state.actions.push(CleanupAction::RemoveFile { path, root });
        });
    }

    /// Mark an already registered temp file as surviving cleanup.
    pub(crate) fn keep(&self, path: &Path) {
        self.with_state(|state| {
            state.keep.insert(path.to_path_buf());
        });
    }

    pub(crate) fn is_kept(&self, path: &Path) -> bool {
        let mut kept = false;
        self.with_state(|state| kept = state.keep.contains(path));
        kept
    }

    /// Run every pending action. Subsequent calls are no-ops.
    ///
    /// The keep set outlives the run so late-dropped handles still honor it.
    pub(crate) fn run(&self) -> std::io::Result<()> {
        let (actions, keep) = {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            (std::mem::take(&mut state.actions), state.keep.clone())
        };

        let mut first_error = None;
        for action in actions.into_iter().rev() {
            match action {
                CleanupAction::ReleaseArchive(handle) => {
                    tracing::debug!(archive = %handle.path().display(), "releasing archive");
                    drop(handle);
                }
                CleanupAction::RemoveFile { path, root } => {
                    if keep.contains(&path) {
                        continue;
                    }
                    match std::fs::remove_file(&path) {
                        Ok(()) => tracing::debug!(path = %path.display(), "removed materialized file"),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "failed to remove materialized file");
                            first_error.get_or_insert(e);
                            continue;
                        }
                    }
                    prune_empty_dirs(&path, &root);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn with_state(&self, f: impl FnOnce(&mut CleanupState)) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state);
    }
}

fn prune_empty_dirs(removed: &Path, root: &Path) {
    let mut dir = removed.parent();
    while let Some(current) = dir {
        if !current.starts_with(root) || std::fs::remove_dir(current).is_err() {
            break;
        }
        if current == root {
            break;
        }
        dir = current.parent();
    }
}
