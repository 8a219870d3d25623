//! Execution outputs.
//!
//! Everything written below the outputs root is uploaded when the execution
//! ends; a file made read-only is uploaded right away.

use crate::compression::OutputArchive;
use crate::error::{ValohaiError, ValohaiResult};
use crate::paths::Paths;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A named output directory. The empty name is the outputs root.
#[derive(Debug, Clone)]
pub struct Output {
    paths: Paths,
    name: String,
}

impl Output {
    pub fn new(paths: &Paths, name: impl Into<String>) -> Self {
        Self { paths: paths.clone(), name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The output directory, created if missing.
    pub fn dir_path(&self) -> ValohaiResult<PathBuf> {
        let dir = self.paths.output_dir(&self.name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Where to write `fragment`; its parent directories are created.
    pub fn path(&self, fragment: &str) -> ValohaiResult<PathBuf> {
        let path = self.paths.output_path(&self.name, fragment)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Upload `source` now instead of at the end of the execution.
    ///
    /// A directory means every file directly inside it; a pattern with
    /// wildcards means every file it matches.
    pub fn live_upload(&self, source: &Path) -> ValohaiResult<()> {
        for file in live_upload_targets(source)? {
            set_read_only(&file)?;
            tracing::info!(path = %file.display(), "marked for live upload");
        }
        Ok(())
    }

    /// Pack `sources` into `archive_name` inside this output and return the archive path.
    ///
    /// Files below the outputs root keep their path relative to it inside the
    /// archive; others are stored under their file name. A directory source
    /// contributes every file below it, prefixed by the directory's own name.
    pub fn compress(&self, sources: &[PathBuf], archive_name: &str, remove_originals: bool) -> ValohaiResult<PathBuf> {
        let archive_path = self.path(archive_name)?;
        let members = self.archive_members(sources)?;

        let mut archive = OutputArchive::create(&archive_path)?;
        for (name, source) in &members {
            archive.put(name, source)?;
        }
        archive.finish()?;
        tracing::info!(archive = %archive_path.display(), files = members.len(), "compressed outputs");

        if remove_originals {
            for (_, source) in &members {
                std::fs::remove_file(source)?;
            }
        }
        Ok(archive_path)
    }

    fn archive_members(&self, sources: &[PathBuf]) -> ValohaiResult<Vec<(String, PathBuf)>> {
        let root = std::path::absolute(self.paths.outputs_dir())?;
        let mut members = Vec::new();
        for source in sources {
            if source.is_dir() {
                let prefix = source.parent().unwrap_or(source);
                for entry in WalkDir::new(source).sort_by_file_name() {
                    let entry = entry.map_err(std::io::Error::from)?;
                    if entry.file_type().is_file() {
                        members.push((archive_name_for(entry.path(), prefix), entry.path().to_path_buf()));
                    }
                }
            } else if source.is_file() {
                let absolute = std::path::absolute(source)?;
                let name = if absolute.starts_with(&root) {
                    archive_name_for(&absolute, &root)
                } else {
                    archive_name_for(source, source.parent().unwrap_or(source))
                };
                members.push((name, source.clone()));
            } else {
                return Err(missing(source));
            }
        }
        Ok(members)
    }
}

fn archive_name_for(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn live_upload_targets(source: &Path) -> ValohaiResult<Vec<PathBuf>> {
    if source.is_dir() {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(source)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        return Ok(files);
    }

    let text = source.to_string_lossy();
    if text.contains(['*', '?', '[']) {
        let mut files = Vec::new();
        for entry in glob::glob(&text)? {
            let path = entry.map_err(glob::GlobError::into_error)?;
            if path.is_file() {
                files.push(path);
            }
        }
        return Ok(files);
    }

    if source.exists() { Ok(vec![source.to_path_buf()]) } else { Err(missing(source)) }
}

fn set_read_only(path: &Path) -> ValohaiResult<()> {
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_readonly(true);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

fn missing(path: &Path) -> ValohaiError {
    ValohaiError::Config(format!("Path {} doesn't exist", path.display()))
}
