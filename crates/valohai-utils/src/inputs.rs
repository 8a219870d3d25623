use crate::context::Context;
use crate::download::DownloadType;
use crate::error::ValohaiResult;
use crate::input_info::InputInfo;
use std::io::Read;
use std::path::PathBuf;
use valohai_vfs::{Vfs, VirtualFile};

/// How an input's files are listed.
#[derive(Debug, Clone)]
pub struct InputOptions {
    /// Glob over logical names, e.g. `"*.csv"` or `"images/**/*.png"`.
    pub path_filter: Option<String>,
    /// List the files inside archives instead of the archives themselves.
    pub process_archives: bool,
    /// Download again even when a cached copy exists.
    pub force_download: bool,
    /// Returned by `paths`/`path` when nothing matches.
    pub default_paths: Vec<PathBuf>,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self { path_filter: None, process_archives: true, force_download: false, default_paths: Vec::new() }
    }
}

impl InputOptions {
    #[must_use]
    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.path_filter = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn process_archives(mut self, process_archives: bool) -> Self {
        self.process_archives = process_archives;
        self
    }

    #[must_use]
    pub fn force_download(mut self, force_download: bool) -> Self {
        self.force_download = force_download;
        self
    }

    #[must_use]
    pub fn default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_paths.push(path.into());
        self
    }

    fn download_type(&self) -> DownloadType {
        if self.force_download { DownloadType::Always } else { DownloadType::Optional }
    }
}

/// A named input of the current process.
pub struct Input<'a> {
    context: &'a Context,
    name: String,
}

impl<'a> Input<'a> {
    pub(crate) fn new(context: &'a Context, name: String) -> Self {
        Self { context, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where this input's files are downloaded.
    pub fn dir_path(&self) -> PathBuf {
        self.context.paths().input_dir(&self.name)
    }

    /// The resolved file list; `None` when the input is unknown.
    pub fn info(&self, download_type: DownloadType) -> ValohaiResult<Option<InputInfo>> {
        self.context.resolve_input(&self.name, download_type)
    }

    /// Download what is missing and build a VFS over the files.
    ///
    /// An unknown input gives an empty VFS.
    pub fn vfs(&self, options: &InputOptions) -> ValohaiResult<Vfs> {
        let mut vfs = Vfs::new();
        if let Some(info) = self.info(options.download_type())? {
            for file in &info.files {
                match &file.path {
                    Some(path) => vfs.add_disk_file(file.name.clone(), path, options.process_archives)?,
                    None => tracing::warn!(input = %self.name, file = %file.name, "input file has no local path"),
                }
            }
        }
        Ok(vfs)
    }

    /// Paths of every matching file. Archive entries are extracted and kept on disk.
    pub fn paths(&self, options: &InputOptions) -> ValohaiResult<Vec<PathBuf>> {
        let vfs = self.vfs(options)?;
        let paths = matching(&vfs, options)?.into_iter().map(VirtualFile::concrete_path).collect::<Result<Vec<_>, _>>()?;
        vfs.close()?;
        Ok(if paths.is_empty() { options.default_paths.clone() } else { paths })
    }

    /// The first of [`paths`](Self::paths).
    pub fn path(&self, options: &InputOptions) -> ValohaiResult<Option<PathBuf>> {
        Ok(self.paths(options)?.into_iter().next())
    }

    /// An open reader per matching file.
    pub fn streams(&self, options: &InputOptions) -> ValohaiResult<Vec<Box<dyn Read + Send>>> {
        let vfs = self.vfs(options)?;
        let streams = matching(&vfs, options)?.into_iter().map(VirtualFile::open).collect::<Result<Vec<_>, _>>()?;
        Ok(streams)
    }

    pub fn stream(&self, options: &InputOptions) -> ValohaiResult<Option<Box<dyn Read + Send>>> {
        let vfs = self.vfs(options)?;
        let first = matching(&vfs, options)?.into_iter().next().map(VirtualFile::open).transpose()?;
        Ok(first)
    }
}

fn matching<'v>(vfs: &'v Vfs, options: &InputOptions) -> ValohaiResult<Vec<&'v VirtualFile>> {
    Ok(match &options.path_filter {
        Some(pattern) => vfs.filter(pattern)?,
        None => vfs.iter().collect(),
    })
}
